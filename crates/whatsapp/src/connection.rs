//! WhatsApp connection lifecycle: QR pairing, reconnection with backoff,
//! and the terminal logged-out state.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use {
    async_trait::async_trait,
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    switchboard_channels::{
        Backoff, ChannelConnection, ConnectionEvent, ConnectionFactory, Error, PairingFlow,
        PairingHandle, PairingState, PairingSupport, Result,
    },
    switchboard_common::types::{
        Channel, ChannelStatus, ChannelType, DeliveryReceipt, OutboundMessage,
    },
};

use crate::transport::{Transport, TransportEvent};

const EVENT_BUFFER: usize = 64;

/// One live WhatsApp session over a [`Transport`].
pub struct WhatsAppConnection {
    shared: Arc<Shared>,
    events_rx: Mutex<Option<mpsc::Receiver<ConnectionEvent>>>,
    started: AtomicBool,
}

struct Shared {
    channel_id: String,
    transport: Arc<dyn Transport>,
    status: Mutex<ChannelStatus>,
    pairing: Mutex<PairingFlow>,
    /// Handle for the QR currently awaiting a scan.
    current_qr: Mutex<Option<PairingHandle>>,
    events_tx: mpsc::Sender<ConnectionEvent>,
    cancel: CancellationToken,
}

impl WhatsAppConnection {
    #[must_use]
    pub fn new(channel_id: impl Into<String>, transport: Arc<dyn Transport>) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        Arc::new(Self {
            shared: Arc::new(Shared {
                channel_id: channel_id.into(),
                transport,
                status: Mutex::new(ChannelStatus::Offline),
                pairing: Mutex::new(PairingFlow::default()),
                current_qr: Mutex::new(None),
                events_tx,
                cancel: CancellationToken::new(),
            }),
            events_rx: Mutex::new(Some(events_rx)),
            started: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl ChannelConnection for WhatsAppConnection {
    fn channel_id(&self) -> &str {
        &self.shared.channel_id
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::WhatsApp
    }

    async fn connect(&self) -> Result<Option<PairingHandle>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::connect("connection already started"));
        }

        let session = match self.shared.transport.open().await {
            Ok(session) => session,
            Err(e) => {
                // Release the guard so the open can be retried, and surface
                // the failure on the channel.
                self.started.store(false, Ordering::SeqCst);
                self.shared
                    .set_status(ChannelStatus::Error, Some(e.to_string()))
                    .await;
                return Err(e);
            },
        };
        let handle = match session.qr.as_deref() {
            Some(qr) => Some(self.shared.issue_qr(qr)?),
            None => None,
        };
        self.shared
            .set_status(ChannelStatus::Connecting, None)
            .await;
        info!(
            channel_id = %self.shared.channel_id,
            pairing = handle.is_some(),
            "whatsapp session opened",
        );

        tokio::spawn(supervise(Arc::clone(&self.shared), session.events));
        Ok(handle)
    }

    async fn disconnect(&self) -> Result<()> {
        // Cancel first so the supervisor never mistakes our own close for a
        // transport loss and reconnects.
        self.shared.cancel.cancel();
        self.shared.transport.close().await?;
        self.shared
            .set_status(ChannelStatus::Offline, Some("disconnected".into()))
            .await;
        Ok(())
    }

    async fn send(&self, outbound: &OutboundMessage) -> Result<DeliveryReceipt> {
        if self.status() != ChannelStatus::Online {
            return Err(Error::not_connected(&self.shared.channel_id));
        }
        self.shared
            .transport
            .deliver(&outbound.to, &outbound.content)
            .await
    }

    fn status(&self) -> ChannelStatus {
        *self.shared.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_events(&self) -> Option<mpsc::Receiver<ConnectionEvent>> {
        self.events_rx.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn pairing(&self) -> Option<&dyn PairingSupport> {
        Some(self)
    }
}

#[async_trait]
impl PairingSupport for WhatsAppConnection {
    async fn pairing_token(&self) -> Result<PairingHandle> {
        let mut pairing = self.shared.pairing.lock().unwrap_or_else(|e| e.into_inner());
        pairing.expire_if_due();
        match pairing.state() {
            PairingState::AwaitingScan => self
                .shared
                .current_qr
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
                .ok_or_else(|| Error::pairing_rejected("no pairing token available")),
            PairingState::Paired => Err(Error::pairing_rejected("session is already paired")),
            PairingState::Expired => Err(Error::PairingExpired),
            state => Err(Error::pairing_rejected(format!(
                "no pairing in progress (state: {state:?})"
            ))),
        }
    }

    async fn confirm(&self, token: &str) -> Result<()> {
        {
            let mut pairing = self.shared.pairing.lock().unwrap_or_else(|e| e.into_inner());
            pairing.confirm(token)?;
        }
        let mut current_qr = self.shared.current_qr.lock().unwrap_or_else(|e| e.into_inner());
        *current_qr = None;
        info!(channel_id = %self.shared.channel_id, "pairing confirmed");
        Ok(())
    }
}

impl Shared {
    /// Deadline of the token currently awaiting a scan.
    fn pairing_deadline(&self) -> Option<tokio::time::Instant> {
        self.pairing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .deadline()
    }

    /// Expire an overdue pairing window and release the pending handle.
    fn expire_pairing(&self) -> bool {
        let expired = self
            .pairing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .expire_if_due();
        if expired {
            let mut qr = self.current_qr.lock().unwrap_or_else(|e| e.into_inner());
            *qr = None;
        }
        expired
    }

    fn issue_qr(&self, qr: &str) -> Result<PairingHandle> {
        let handle = {
            let mut pairing = self.pairing.lock().unwrap_or_else(|e| e.into_inner());
            // A reopened session handing out fresh QR material means the old
            // credentials are gone.
            if pairing.state() == PairingState::Paired {
                pairing.reset();
            }
            pairing.issue(qr)?
        };
        let mut current_qr = self.current_qr.lock().unwrap_or_else(|e| e.into_inner());
        *current_qr = Some(handle.clone());
        Ok(handle)
    }

    async fn set_status(&self, status: ChannelStatus, detail: Option<String>) {
        {
            let mut current = self.status.lock().unwrap_or_else(|e| e.into_inner());
            *current = status;
        }
        let _ = self
            .events_tx
            .send(ConnectionEvent::StatusChanged {
                channel_id: self.channel_id.clone(),
                status,
                detail,
            })
            .await;
    }

    async fn emit_inbound(&self, payload: serde_json::Value) {
        let _ = self
            .events_tx
            .send(ConnectionEvent::Inbound {
                channel_id: self.channel_id.clone(),
                payload,
            })
            .await;
    }
}

enum SessionEnd {
    Cancelled,
    LoggedOut,
    Lost,
}

/// Drives one connection across session losses. Exits on cancellation or
/// logout; everything else goes through the backoff loop.
async fn supervise(shared: Arc<Shared>, first_events: mpsc::Receiver<TransportEvent>) {
    let mut backoff = Backoff::default();
    let mut events = first_events;
    loop {
        match drain_session(&shared, &mut events, &mut backoff).await {
            SessionEnd::Cancelled => return,
            SessionEnd::LoggedOut => {
                info!(channel_id = %shared.channel_id, "logged out, not reconnecting");
                return;
            },
            SessionEnd::Lost => {},
        }

        loop {
            let delay = backoff.next_delay();
            debug!(channel_id = %shared.channel_id, ?delay, "reconnect backoff");
            tokio::select! {
                _ = shared.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {},
            }
            match shared.transport.open().await {
                Ok(session) => {
                    if let Some(qr) = session.qr.as_deref() {
                        if let Err(e) = shared.issue_qr(qr) {
                            warn!(channel_id = %shared.channel_id, error = %e, "re-pair failed");
                        }
                    }
                    shared
                        .set_status(ChannelStatus::Connecting, Some("reconnecting".into()))
                        .await;
                    events = session.events;
                    break;
                },
                Err(e) => {
                    warn!(channel_id = %shared.channel_id, error = %e, "reopen failed");
                    shared
                        .set_status(ChannelStatus::Error, Some(e.to_string()))
                        .await;
                },
            }
        }
    }
}

async fn drain_session(
    shared: &Shared,
    events: &mut mpsc::Receiver<TransportEvent>,
    backoff: &mut Backoff,
) -> SessionEnd {
    loop {
        // Arm the scan deadline so an unconfirmed token surfaces as an error
        // instead of leaving the channel in `connecting` forever.
        let deadline = shared.pairing_deadline();
        let event = tokio::select! {
            _ = shared.cancel.cancelled() => return SessionEnd::Cancelled,
            () = pairing_window(deadline) => {
                if shared.expire_pairing() {
                    warn!(channel_id = %shared.channel_id, "pairing token expired before scan");
                    shared
                        .set_status(ChannelStatus::Error, Some("pairing token expired".into()))
                        .await;
                }
                continue;
            },
            event = events.recv() => event,
        };
        match event {
            None => {
                shared
                    .set_status(ChannelStatus::Connecting, Some("transport stream closed".into()))
                    .await;
                return SessionEnd::Lost;
            },
            Some(TransportEvent::Connected { phone_number }) => {
                backoff.reset();
                {
                    let mut pairing = shared.pairing.lock().unwrap_or_else(|e| e.into_inner());
                    pairing.mark_paired();
                }
                {
                    let mut qr = shared.current_qr.lock().unwrap_or_else(|e| e.into_inner());
                    *qr = None;
                }
                info!(channel_id = %shared.channel_id, ?phone_number, "whatsapp connected");
                shared
                    .set_status(ChannelStatus::Online, phone_number)
                    .await;
            },
            Some(TransportEvent::Disconnected { logged_out: true, reason }) => {
                warn!(channel_id = %shared.channel_id, reason, "whatsapp logged out");
                {
                    let mut pairing = shared.pairing.lock().unwrap_or_else(|e| e.into_inner());
                    pairing.fail();
                }
                shared
                    .set_status(ChannelStatus::Offline, Some("logged out".into()))
                    .await;
                return SessionEnd::LoggedOut;
            },
            Some(TransportEvent::Disconnected { logged_out: false, reason }) => {
                warn!(channel_id = %shared.channel_id, reason, "whatsapp session lost");
                shared
                    .set_status(ChannelStatus::Connecting, Some(reason))
                    .await;
                return SessionEnd::Lost;
            },
            Some(TransportEvent::Inbound {
                message_id,
                from,
                sender_name,
                text,
            }) => {
                debug!(channel_id = %shared.channel_id, from, "inbound whatsapp message");
                shared
                    .emit_inbound(serde_json::json!({
                        "message_id": message_id,
                        "from": from,
                        "sender_name": sender_name,
                        "text": text,
                    }))
                    .await;
            },
        }
    }
}

/// Completes when an armed pairing window elapses; pends forever otherwise.
async fn pairing_window(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Builds [`WhatsAppConnection`]s for the registry, one transport per
/// channel.
pub struct WhatsAppFactory {
    make_transport: Arc<dyn Fn(&Channel) -> Arc<dyn Transport> + Send + Sync>,
}

impl WhatsAppFactory {
    #[must_use]
    pub fn new(make_transport: Arc<dyn Fn(&Channel) -> Arc<dyn Transport> + Send + Sync>) -> Self {
        Self { make_transport }
    }
}

#[async_trait]
impl ConnectionFactory for WhatsAppFactory {
    async fn create(&self, channel: &Channel) -> Result<Arc<dyn ChannelConnection>> {
        let transport = (self.make_transport)(channel);
        Ok(WhatsAppConnection::new(&channel.id, transport) as Arc<dyn ChannelConnection>)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::atomic::AtomicUsize,
        time::Duration,
    };

    use {super::*, crate::transport::Session, switchboard_common::now_ms};

    struct MockTransport {
        opens: AtomicUsize,
        sessions: Mutex<VecDeque<Session>>,
        delivered: Mutex<Vec<(String, String)>>,
    }

    impl MockTransport {
        fn new(sessions: Vec<Session>) -> Arc<Self> {
            Arc::new(Self {
                opens: AtomicUsize::new(0),
                sessions: Mutex::new(sessions.into()),
                delivered: Mutex::new(Vec::new()),
            })
        }

        fn open_count(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }

        fn delivered_count(&self) -> usize {
            self.delivered.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn open(&self) -> Result<Session> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.sessions
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::connect("no session scripted"))
        }

        async fn deliver(&self, to: &str, content: &str) -> Result<DeliveryReceipt> {
            let mut delivered = self.delivered.lock().unwrap();
            delivered.push((to.to_string(), content.to_string()));
            Ok(DeliveryReceipt {
                transport_message_id: format!("wamid-{}", delivered.len()),
                delivered_at: now_ms(),
            })
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn session(qr: Option<&str>) -> (Session, mpsc::Sender<TransportEvent>) {
        let (tx, rx) = mpsc::channel(16);
        (
            Session {
                qr: qr.map(str::to_string),
                events: rx,
            },
            tx,
        )
    }

    async fn wait_for_status(conn: &WhatsAppConnection, want: ChannelStatus) {
        for _ in 0..200 {
            if conn.status() == want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("status never became {want:?}, still {:?}", conn.status());
    }

    #[tokio::test(start_paused = true)]
    async fn qr_pairing_brings_the_session_online() {
        let (session, tx) = session(Some("qr-abc"));
        let transport = MockTransport::new(vec![session]);
        let conn = WhatsAppConnection::new("ch-wa", Arc::clone(&transport) as Arc<dyn Transport>);

        let handle = conn.connect().await.unwrap().unwrap();
        assert_eq!(handle.token, "qr-abc");
        assert_eq!(handle.expires_in_seconds, 60);
        assert_eq!(conn.status(), ChannelStatus::Connecting);

        conn.confirm("qr-abc").await.unwrap();
        tx.send(TransportEvent::Connected {
            phone_number: Some("+4917000000".into()),
        })
        .await
        .unwrap();
        wait_for_status(&conn, ChannelStatus::Online).await;

        // Token requests after pairing are rejected.
        assert!(conn.pairing_token().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_confirmation_is_rejected() {
        let (session, _tx) = session(Some("qr-abc"));
        let transport = MockTransport::new(vec![session]);
        let conn = WhatsAppConnection::new("ch-wa", transport as Arc<dyn Transport>);
        conn.connect().await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        let err = conn.confirm("qr-abc").await.unwrap_err();
        assert!(matches!(err, Error::PairingExpired));
        assert!(matches!(conn.pairing_token().await, Err(Error::PairingExpired)));
    }

    #[tokio::test(start_paused = true)]
    async fn unscanned_token_expiry_surfaces_as_error_status() {
        let (session, _tx) = session(Some("qr-abc"));
        let transport = MockTransport::new(vec![session]);
        let conn = WhatsAppConnection::new("ch-wa", transport as Arc<dyn Transport>);
        conn.connect().await.unwrap();
        assert_eq!(conn.status(), ChannelStatus::Connecting);

        tokio::time::advance(Duration::from_secs(61)).await;
        wait_for_status(&conn, ChannelStatus::Error).await;
        assert!(matches!(
            conn.pairing_token().await,
            Err(Error::PairingExpired)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_open_surfaces_and_allows_a_retry() {
        let transport = MockTransport::new(vec![]);
        let conn = WhatsAppConnection::new("ch-wa", Arc::clone(&transport) as Arc<dyn Transport>);

        assert!(conn.connect().await.is_err());
        assert_eq!(conn.status(), ChannelStatus::Error);

        // A later connect gets a fresh chance at the transport.
        let (session, tx) = session(None);
        transport.sessions.lock().unwrap().push_back(session);
        conn.connect().await.unwrap();
        tx.send(TransportEvent::Connected { phone_number: None })
            .await
            .unwrap();
        wait_for_status(&conn, ChannelStatus::Online).await;
    }

    #[tokio::test(start_paused = true)]
    async fn send_requires_an_online_session() {
        let (session, tx) = session(None);
        let transport = MockTransport::new(vec![session]);
        let conn = WhatsAppConnection::new("ch-wa", Arc::clone(&transport) as Arc<dyn Transport>);
        conn.connect().await.unwrap();

        let outbound = OutboundMessage {
            channel_id: "ch-wa".into(),
            to: "491700000001".into(),
            content: "hello".into(),
        };
        let err = conn.send(&outbound).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected { .. }));
        assert_eq!(transport.delivered_count(), 0);

        tx.send(TransportEvent::Connected { phone_number: None })
            .await
            .unwrap();
        wait_for_status(&conn, ChannelStatus::Online).await;
        let receipt = conn.send(&outbound).await.unwrap();
        assert_eq!(receipt.transport_message_id, "wamid-1");
        assert_eq!(transport.delivered_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_loss_reopens_the_session() {
        let (first, tx1) = session(None);
        let (second, tx2) = session(None);
        let transport = MockTransport::new(vec![first, second]);
        let conn = WhatsAppConnection::new("ch-wa", Arc::clone(&transport) as Arc<dyn Transport>);
        conn.connect().await.unwrap();

        tx1.send(TransportEvent::Connected { phone_number: None })
            .await
            .unwrap();
        wait_for_status(&conn, ChannelStatus::Online).await;

        tx1.send(TransportEvent::Disconnected {
            logged_out: false,
            reason: "stream error".into(),
        })
        .await
        .unwrap();

        // Backoff runs on the paused clock, so the reopen lands quickly.
        for _ in 0..200 {
            if transport.open_count() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(transport.open_count(), 2);

        tx2.send(TransportEvent::Connected { phone_number: None })
            .await
            .unwrap();
        wait_for_status(&conn, ChannelStatus::Online).await;
    }

    #[tokio::test(start_paused = true)]
    async fn logout_is_terminal() {
        let (session, tx) = session(None);
        let transport = MockTransport::new(vec![session]);
        let conn = WhatsAppConnection::new("ch-wa", Arc::clone(&transport) as Arc<dyn Transport>);
        conn.connect().await.unwrap();

        tx.send(TransportEvent::Connected { phone_number: None })
            .await
            .unwrap();
        wait_for_status(&conn, ChannelStatus::Online).await;

        tx.send(TransportEvent::Disconnected {
            logged_out: true,
            reason: "device removed".into(),
        })
        .await
        .unwrap();
        wait_for_status(&conn, ChannelStatus::Offline).await;

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(transport.open_count(), 1, "logout must not trigger reconnects");
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_events_carry_the_raw_payload() {
        let (session, tx) = session(None);
        let transport = MockTransport::new(vec![session]);
        let conn = WhatsAppConnection::new("ch-wa", transport as Arc<dyn Transport>);
        let mut events = conn.take_events().unwrap();
        conn.connect().await.unwrap();

        tx.send(TransportEvent::Inbound {
            message_id: "wamid-in-1".into(),
            from: "491700000001".into(),
            sender_name: Some("Ada".into()),
            text: "hola".into(),
        })
        .await
        .unwrap();

        loop {
            match events.recv().await.unwrap() {
                ConnectionEvent::Inbound { channel_id, payload } => {
                    assert_eq!(channel_id, "ch-wa");
                    assert_eq!(payload["message_id"], "wamid-in-1");
                    assert_eq!(payload["from"], "491700000001");
                    assert_eq!(payload["sender_name"], "Ada");
                    assert_eq!(payload["text"], "hola");
                    break;
                },
                ConnectionEvent::StatusChanged { .. } => continue,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_connect_is_rejected() {
        let (session, _tx) = session(None);
        let transport = MockTransport::new(vec![session]);
        let conn = WhatsAppConnection::new("ch-wa", transport as Arc<dyn Transport>);
        conn.connect().await.unwrap();
        assert!(conn.connect().await.is_err());
    }
}

#[cfg(feature = "tracing")]
use tracing::{debug, error, info};

use crate::{
    LoadSource, SystemLoad, Transport,
    command::parse,
    handler::{Control, handle},
};

/// Lifecycle of the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    /// Entered after the shutdown reply has been sent. Final.
    Terminated,
}

/// What a finished [`Server::run`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Requests that were parsed and answered (send failures included).
    pub served: usize,
}

/// The request dispatch loop.
///
/// Each iteration receives one datagram, parses it into a [`crate::Command`],
/// runs the matching handler and sends the reply back to the sender before
/// anything else is read. Requests are never processed concurrently.
///
/// Receive and send failures are logged and the loop carries on; only a
/// `<shutdown/>` request ends it.
pub struct Server<T, L = SystemLoad> {
    transport: T,
    load: L,
    state: State,
    served: usize,
}

impl<T> Server<T, SystemLoad>
where
    T: Transport,
{
    /// Creates a server answering `<loadavg/>` from the host.
    pub fn new(transport: T) -> Self {
        Self::with_load_source(transport, SystemLoad)
    }
}

impl<T, L> Server<T, L>
where
    T: Transport,
    L: LoadSource,
{
    /// Creates a server answering `<loadavg/>` from `load`.
    pub fn with_load_source(transport: T, load: L) -> Self {
        Self {
            transport,
            load,
            state: State::Running,
            served: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn served(&self) -> usize {
        self.served
    }

    /// Performs one receive → parse → handle → reply iteration.
    ///
    /// Returns the state after the iteration. Once [`State::Terminated`] is
    /// reached further calls do nothing.
    pub async fn step(&mut self) -> State {
        if self.state == State::Terminated {
            return self.state;
        }

        let request = match self.transport.receive().await {
            Ok(request) => request,
            Err(e) => {
                #[cfg(feature = "tracing")]
                error!("recv_from failed, waiting for next datagram: {:?}", e);

                #[cfg(not(feature = "tracing"))]
                let _ = e;

                return self.state;
            }
        };

        let command = parse(&request.payload);

        #[cfg(feature = "tracing")]
        info!(
            peer = %request.peer,
            command = command.name(),
            "Received {:?}",
            String::from_utf8_lossy(&request.payload)
        );

        let response = handle(&command, &self.load);

        match self
            .transport
            .send(response.reply.as_bytes(), request.peer)
            .await
        {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                debug!(peer = %request.peer, "Sent {}", response.reply);
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                error!("send_to {} failed, reply dropped: {:?}", request.peer, e);

                #[cfg(not(feature = "tracing"))]
                let _ = e;
            }
        }

        self.served = self.served.saturating_add(1);

        if response.control == Control::Shutdown {
            #[cfg(feature = "tracing")]
            info!("Shutdown requested by {}. The server is powering off.", request.peer);

            self.state = State::Terminated;
        }

        self.state
    }

    /// Serves requests until a `<shutdown/>` request has been answered,
    /// then closes the transport.
    pub async fn run(mut self) -> Summary {
        #[cfg(feature = "tracing")]
        info!("Waiting for requests...");

        while self.step().await == State::Running {}

        let Server {
            transport, served, ..
        } = self;
        transport.close();

        #[cfg(feature = "tracing")]
        info!("Server stopped after {} requests.", served);

        Summary { served }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BindMode, Client, Endpoint, Error, LoadAverage, Request, Result,
        handler::{LOADAVG_UNAVAILABLE, SHUTTING_DOWN, UNKNOWN_FORMAT},
    };
    use async_trait::async_trait;
    use std::{
        collections::VecDeque,
        io::{self, ErrorKind},
        net::{IpAddr, Ipv4Addr, SocketAddr},
        sync::{Arc, Mutex},
    };
    use tokio_util::bytes::Bytes;

    #[derive(Default)]
    struct Log {
        sent: Vec<(String, SocketAddr)>,
        closed: bool,
    }

    /// Replays a fixed list of receive results and records every send.
    struct Scripted {
        incoming: VecDeque<io::Result<Request>>,
        fail_sends: bool,
        log: Arc<Mutex<Log>>,
    }

    impl Scripted {
        fn new(incoming: Vec<io::Result<Request>>) -> (Self, Arc<Mutex<Log>>) {
            let log = Arc::new(Mutex::new(Log::default()));
            let transport = Self {
                incoming: incoming.into(),
                fail_sends: false,
                log: Arc::clone(&log),
            };
            (transport, log)
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn receive(&mut self) -> io::Result<Request> {
            self.incoming
                .pop_front()
                .expect("script exhausted before shutdown")
        }

        async fn send(&mut self, reply: &[u8], peer: SocketAddr) -> io::Result<()> {
            if self.fail_sends {
                return Err(io::Error::new(ErrorKind::ConnectionRefused, "refused"));
            }
            let reply = String::from_utf8(reply.to_vec()).unwrap();
            self.log.lock().unwrap().sent.push((reply, peer));
            Ok(())
        }

        fn close(self) {
            self.log.lock().unwrap().closed = true;
        }
    }

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn request(text: &str, port: u16) -> io::Result<Request> {
        Ok(Request {
            payload: Bytes::copy_from_slice(text.as_bytes()),
            peer: peer(port),
        })
    }

    fn steady() -> Result<LoadAverage> {
        Ok(LoadAverage {
            one: 0.25,
            five: 0.5,
            fifteen: 0.75,
        })
    }

    fn unavailable() -> Result<LoadAverage> {
        Err(Error::LoadAverageUnavailable)
    }

    #[tokio::test]
    async fn test_replies_in_request_order() {
        let (transport, log) = Scripted::new(vec![
            request("<echo>ping</echo>", 1001),
            request("<loadavg/>", 1002),
            request("hello", 1003),
            request("<ECHO>hi</ECHO>\n", 1004),
            request("<shutdown/>", 1005),
        ]);

        let summary = Server::with_load_source(transport, steady).run().await;
        assert_eq!(summary.served, 5);

        let log = log.lock().unwrap();
        let expected = [
            ("<reply>ping</reply>", 1001),
            ("<replyLoadAvg>0.250000:0.500000:0.750000</replyLoadAvg>", 1002),
            (UNKNOWN_FORMAT, 1003),
            ("<reply>hi</reply>", 1004),
            (SHUTTING_DOWN, 1005),
        ];
        assert_eq!(log.sent.len(), expected.len());
        for ((reply, to), (want, port)) in log.sent.iter().zip(expected) {
            assert_eq!(reply, want);
            assert_eq!(*to, peer(port));
        }
        assert!(log.closed);
    }

    #[tokio::test]
    async fn test_shutdown_terminates_after_one_send() {
        let (transport, log) = Scripted::new(vec![
            request("<shutdown/>", 2000),
            request("<echo>never read</echo>", 2001),
        ]);
        let mut server = Server::with_load_source(transport, steady);

        assert_eq!(server.state(), State::Running);
        assert_eq!(server.step().await, State::Terminated);
        assert_eq!(log.lock().unwrap().sent.len(), 1);

        // Terminated has no outgoing transitions.
        assert_eq!(server.step().await, State::Terminated);
        assert_eq!(server.served(), 1);
        assert_eq!(log.lock().unwrap().sent.len(), 1);
    }

    #[tokio::test]
    async fn test_receive_failure_is_not_fatal() {
        let (transport, log) = Scripted::new(vec![
            Err(io::Error::new(ErrorKind::InvalidData, "bad address")),
            request("<echo>after</echo>", 3000),
            request("<shutdown/>", 3000),
        ]);
        let mut server = Server::with_load_source(transport, steady);

        assert_eq!(server.step().await, State::Running);
        assert_eq!(server.served(), 0);
        assert!(log.lock().unwrap().sent.is_empty());

        let summary = server.run().await;
        assert_eq!(summary.served, 2);
        assert_eq!(log.lock().unwrap().sent[0].0, "<reply>after</reply>");
    }

    #[tokio::test]
    async fn test_send_failure_is_not_fatal() {
        let (mut transport, log) = Scripted::new(vec![
            request("<loadavg/>", 4000),
            request("<shutdown/>", 4000),
        ]);
        transport.fail_sends = true;

        let summary = Server::with_load_source(transport, steady).run().await;
        assert_eq!(summary.served, 2);

        let log = log.lock().unwrap();
        assert!(log.sent.is_empty());
        assert!(log.closed);
    }

    #[tokio::test]
    async fn test_load_source_failure_is_reported() {
        let (transport, log) = Scripted::new(vec![
            request("<LOADAVG/>", 5000),
            request("<shutdown/>", 5000),
        ]);

        Server::with_load_source(transport, unavailable).run().await;
        assert_eq!(log.lock().unwrap().sent[0].0, LOADAVG_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_full_datagram_echo_keeps_closing_tag() {
        let payload = "y".repeat(crate::MAX_DATAGRAM - "<echo></echo>".len());
        let (transport, log) = Scripted::new(vec![
            request(&format!("<echo>{payload}</echo>"), 6000),
            request("<shutdown/>", 6000),
        ]);

        Server::with_load_source(transport, steady).run().await;

        let log = log.lock().unwrap();
        let reply = &log.sent[0].0;
        assert!(reply.len() <= crate::MAX_DATAGRAM);
        assert!(reply.starts_with("<reply>yyy"));
        assert!(reply.ends_with("y</reply>"));
    }

    #[tokio::test]
    async fn test_round_trip_over_loopback() {
        let endpoint = Endpoint::open(BindMode::Specific(IpAddr::V4(Ipv4Addr::LOCALHOST)), 0, None)
            .await
            .unwrap();
        let port = endpoint.local_addr().unwrap().port();
        let server = Server::with_load_source(endpoint, steady);

        let client = async {
            let client = Client::connect("127.0.0.1", port).await.unwrap();
            let mut replies = Vec::new();
            for req in ["<echo>ping</echo>", "<loadavg/>", "<foo/>", "<shutdown/>"] {
                replies.push(client.request(req).await.unwrap());
            }
            replies
        };

        let (summary, replies) = tokio::join!(server.run(), client);
        assert_eq!(summary.served, 4);
        assert_eq!(
            replies,
            vec![
                "<reply>ping</reply>".to_string(),
                "<replyLoadAvg>0.250000:0.500000:0.750000</replyLoadAvg>".to_string(),
                UNKNOWN_FORMAT.to_string(),
                SHUTTING_DOWN.to_string(),
            ]
        );
    }
}

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use imap_skim::{ClientBuilder, Completion, Error, FetchConfig, Session, SessionConfig, Status};

const GREETING: &str = "* OK [CAPABILITY IMAP4rev1] test server ready\r\n";

/// A one-connection server on the loopback interface.
///
/// It sends the greeting, then answers each line it receives with the next scripted reply.
/// Once the script runs out it waits for `linger` and hangs up. Joining yields the lines the
/// client sent.
struct ScriptedServer {
    port: u16,
    handle: JoinHandle<Vec<String>>,
}

impl ScriptedServer {
    fn start(replies: Vec<&'static str>, linger: Duration) -> ScriptedServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            writer.write_all(GREETING.as_bytes()).unwrap();

            let mut received = Vec::new();
            for reply in replies {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 {
                    break;
                }
                received.push(line.trim_end().to_string());
                writer.write_all(reply.as_bytes()).unwrap();
            }
            thread::sleep(linger);
            received
        });
        ScriptedServer { port, handle }
    }

    fn session(&self, config: SessionConfig) -> Session<TcpStream> {
        ClientBuilder::new("127.0.0.1", self.port)
            .connect_timeout(Duration::from_secs(5))
            .config(config)
            .connect(|_, tcp| Ok(tcp))
            .unwrap()
    }

    fn received(self) -> Vec<String> {
        self.handle.join().unwrap()
    }
}

fn config() -> SessionConfig {
    SessionConfig::default().with_timeout(Some(Duration::from_secs(5)))
}

#[test]
fn login_select_search_fetch_logout() {
    let server = ScriptedServer::start(
        vec![
            "* CAPABILITY IMAP4rev1 UNSELECT IDLE NAMESPACE\r\n\
             a1 OK user authenticated (Success)\r\n",
            "* FLAGS (\\Answered \\Flagged \\Draft \\Deleted \\Seen)\r\n\
             * OK [PERMANENTFLAGS (\\Answered \\Flagged \\Draft \\Deleted \\Seen \\*)] Flags permitted.\r\n\
             * OK [UIDVALIDITY 3] UIDs valid.\r\n\
             * 2 EXISTS\r\n\
             * 0 RECENT\r\n\
             * OK [UIDNEXT 3] Predicted next UID.\r\n\
             a2 OK [READ-WRITE] INBOX selected. (Success)\r\n",
            "* SEARCH 1 2\r\n\
             a3 OK SEARCH completed (Success)\r\n",
            "* 1 FETCH (FLAGS (\\Seen) BODY[HEADER.FIELDS (FROM SUBJECT DATE CONTENT-TRANSFER-ENCODING)] {95}\r\n\
             From: Ana <ana@example.com>\r\n\
             Subject: Lunch on Friday\r\n\
             Date: Fri, 3 Oct 2025 09:15:00 +0000\r\n\
             \r\n\
             )\r\n\
             a4 OK Success\r\n",
            "* 1 FETCH (BODY[TEXT]<0> {26}\r\n\
             Noon at the usual place?\r\n\
             )\r\n\
             a5 OK Success\r\n",
            "* 2 FETCH (FLAGS () BODY[HEADER.FIELDS (FROM SUBJECT DATE CONTENT-TRANSFER-ENCODING)] {83}\r\n\
             From: Bo <bo@example.com>\r\n\
             Subject: Your key\r\n\
             Content-Transfer-Encoding: base64\r\n\
             \r\n\
             )\r\n\
             a6 OK Success\r\n",
            "* 2 FETCH (BODY[TEXT]<0> {22}\r\n\
             VGhlIGtleSBpcyA0Mg==\r\n\
             )\r\n\
             a7 OK Success\r\n",
            "* BYE LOGOUT Requested\r\n\
             a8 OK 73 good day (Success)\r\n",
        ],
        Duration::ZERO,
    );

    let mut session = server.session(config());
    let login = session.login("ana@example.com", "hunter2").unwrap();
    assert_eq!(login.status(), Some(Status::Ok));

    let report = session.fetch_recent(&FetchConfig::default()).unwrap();
    assert_eq!(session.selected_mailbox(), Some("INBOX"));
    assert_eq!(report.found, 2);
    assert_eq!(report.parsed(), 2);

    let lunch = &report.records[0];
    assert_eq!(lunch.id, "1");
    assert_eq!(lunch.headers.sender(), Some("Ana <ana@example.com>"));
    assert_eq!(lunch.headers.subject(), Some("Lunch on Friday"));
    assert!(lunch.headers.date().is_some());
    assert_eq!(lunch.body.as_str(), "Noon at the usual place?");

    let key = &report.records[1];
    assert_eq!(key.body.as_str(), "The key is 42");
    assert!(key.matches("KEY"));
    assert!(!lunch.matches("key"));

    let logout = session.logout().unwrap();
    assert!(logout.is_ok());

    assert_eq!(
        server.received(),
        [
            "a1 LOGIN ana@example.com hunter2",
            "a2 SELECT INBOX",
            "a3 SEARCH ALL",
            "a4 FETCH 1 (FLAGS BODY.PEEK[HEADER.FIELDS (FROM SUBJECT DATE CONTENT-TRANSFER-ENCODING)])",
            "a5 FETCH 1 BODY.PEEK[TEXT]<0.500>",
            "a6 FETCH 2 (FLAGS BODY.PEEK[HEADER.FIELDS (FROM SUBJECT DATE CONTENT-TRANSFER-ENCODING)])",
            "a7 FETCH 2 BODY.PEEK[TEXT]<0.500>",
            "a8 LOGOUT",
        ]
    );
}

#[test]
fn strict_select_waits_for_tagged_line() {
    let server = ScriptedServer::start(
        vec![
            "* OK [UIDVALIDITY 3] UIDs valid.\r\n\
             * 2 EXISTS\r\n\
             a1 OK [READ-WRITE] SELECT completed\r\n",
        ],
        Duration::ZERO,
    );

    let strict = SessionConfig::strict().with_timeout(Some(Duration::from_secs(5)));
    let mut session = server.session(strict);
    let response = session.select("INBOX").unwrap();
    assert_eq!(response.completion(), Completion::Tagged(Status::Ok));
    assert_eq!(response.lines().count(), 3);
    assert_eq!(session.selected_mailbox(), Some("INBOX"));
    drop(session);

    assert_eq!(server.received(), ["a1 SELECT INBOX"]);
}

#[test]
fn silent_server_times_out() {
    let server = ScriptedServer::start(vec!["* 3 EXISTS\r\n"], Duration::from_secs(2));

    let mut session = server.session(config().with_timeout(Some(Duration::from_millis(200))));
    let started = Instant::now();
    match session.noop() {
        Err(Error::Timeout { tag, partial, .. }) => {
            assert_eq!(tag, "a1");
            assert_eq!(partial.as_str(), "* 3 EXISTS\r\n");
        }
        other => panic!("expected a timeout, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(2));
    drop(session);

    assert_eq!(server.received(), ["a1 NOOP"]);
}

#[test]
fn early_close_keeps_partial_response() {
    let server = ScriptedServer::start(vec!["* SEARCH 4 5\r\n"], Duration::ZERO);

    let mut session = server.session(config());
    let response = session.send_command("SEARCH", "ALL").unwrap();
    assert_eq!(response.completion(), Completion::Closed);
    assert_eq!(
        imap_skim::parse::extract_message_ids(response.as_str()),
        ["4", "5"]
    );

    drop(session);

    assert_eq!(server.received(), ["a1 SEARCH ALL"]);
}

#[test]
fn early_close_is_an_error_in_strict_mode() {
    let server = ScriptedServer::start(vec!["* SEARCH 4 5\r\n"], Duration::ZERO);

    let mut session = server.session(SessionConfig::strict());
    match session.search("ALL") {
        Err(Error::Protocol { tag, partial }) => {
            assert_eq!(tag, "a1");
            assert_eq!(partial.as_str(), "* SEARCH 4 5\r\n");
        }
        other => panic!("expected a protocol error, got {:?}", other),
    }
    server.received();
}

#[test]
fn refused_connection() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = ClientBuilder::new("127.0.0.1", port)
        .connect(|_, tcp| Ok(tcp))
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));

    let err = ClientBuilder::new("127.0.0.1", port)
        .connect_timeout(Duration::from_secs(1))
        .connect(|_, tcp| Ok(tcp))
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

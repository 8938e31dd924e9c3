//! End-to-end tests: the client talking to the server over real sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use courier_mime::{Content, Multipart, Text};
use courier_smtp::command::Command;
use courier_smtp::mx::StaticResolver;
use courier_smtp::server::{self, Policy, Server, SessionInfo};
use courier_smtp::{Address, Client, Config, Error, Mail, Security, SmtpStream, delivery};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;

type Received = mpsc::UnboundedReceiver<(SessionInfo, Mail)>;

/// Policy that refuses the local-part `denied` and records delivered mail.
struct Recorder {
    tx: mpsc::UnboundedSender<(SessionInfo, Mail)>,
}

impl Policy for Recorder {
    fn welcome_message(&self, _session: &SessionInfo) -> String {
        "Wêlcömé".into()
    }

    fn hostname(&self, _session: &SessionInfo) -> String {
        "mx.test".into()
    }

    fn is_sender_accepted(&self, _session: &SessionInfo, sender: &Address) -> bool {
        sender.local_part() != "denied"
    }

    fn is_recipient_accepted(&self, _session: &SessionInfo, recipient: &Address) -> bool {
        recipient.local_part() != "denied"
    }

    fn on_mail_composed(&self, session: &SessionInfo, mail: Mail) -> bool {
        self.tx.send((session.clone(), mail)).is_ok()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn start_server(tls: Option<TlsAcceptor>) -> (Server, SocketAddr, Received) {
    init_tracing();
    let (tx, rx) = mpsc::unbounded_channel();
    let mut builder = server::Config::builder()
        .listen([SocketAddr::from(([127, 0, 0, 1], 0))])
        .shutdown_grace(Duration::from_millis(500));
    if let Some(acceptor) = tls {
        builder = builder.tls(acceptor);
    }

    let server = Server::start(builder.build(), Arc::new(Recorder { tx }))
        .await
        .unwrap();
    let addr = server.local_addrs()[0];
    (server, addr, rx)
}

fn plain_config() -> Config {
    Config::builder()
        .client_hostname("client.test")
        .security(Security::Disabled)
        .reply_timeout(Duration::from_secs(5))
        .build()
}

async fn connect(addr: SocketAddr) -> Client {
    Client::connect("127.0.0.1", addr.port(), plain_config())
        .await
        .unwrap()
}

async fn next_mail(rx: &mut Received) -> (SessionInfo, Mail) {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap()
}

fn address(mailbox: &str) -> Address {
    Address::new(mailbox).unwrap()
}

#[tokio::test]
async fn test_welcome_message_verbatim() {
    let (server, addr, _rx) = start_server(None).await;

    let mut client = connect(addr).await;
    assert_eq!(client.welcome_message(), "Wêlcömé");
    client.quit().await.unwrap();

    server.shutdown(true).await;
}

#[tokio::test]
async fn test_hello_reports_capabilities() {
    let (server, addr, _rx) = start_server(None).await;

    let mut client = connect(addr).await;
    client.hello().await.unwrap();
    assert!(client.is_extended());
    assert_eq!(client.server_info().hostname, "mx.test");
    assert!(client.server_info().supports_pipelining());
    assert!(!client.server_info().supports_starttls());

    server.shutdown(true).await;
}

#[tokio::test]
async fn test_denied_sender_and_recipient() {
    let (server, addr, _rx) = start_server(None).await;

    let mut client = connect(addr).await;
    client.hello().await.unwrap();

    let err = client.mail_from(&address("denied@example.com")).await.unwrap_err();
    assert!(matches!(err, Error::Smtp { code: 553, .. }));

    client.mail_from(&address("sender@example.com")).await.unwrap();
    let err = client.to(&address("denied@example.com")).await.unwrap_err();
    assert!(matches!(err, Error::Smtp { code: 553, .. }));
    client.to(&address("recipient@example.com")).await.unwrap();

    server.shutdown(true).await;
}

#[tokio::test]
async fn test_pipelined_transaction() {
    let (server, addr, mut rx) = start_server(None).await;

    let mut client = connect(addr).await;
    client.hello().await.unwrap();

    let replies = client
        .pipeline(&[
            Command::MailFrom {
                from: address("sender@example.com"),
                body: None,
                size: None,
            },
            Command::RcptTo {
                to: address("recipient@example.com"),
            },
            Command::RcptTo {
                to: address("denied@example.com"),
            },
            Command::Data,
        ])
        .await
        .unwrap();

    let codes: Vec<u16> = replies.iter().map(|r| r.code.as_u16()).collect();
    assert_eq!(codes[0], 250);
    assert_eq!(codes[1], 250);
    assert_ne!(codes[2], 250);
    assert_eq!(codes[3], 354);

    let reply = client
        .send_data(&Content::from(Text::plain("Pipelined")))
        .await
        .unwrap();
    assert_eq!(reply.code.as_u16(), 250);

    let (_, mail) = next_mail(&mut rx).await;
    assert_eq!(mail.sender().mailbox(), "sender@example.com");
    assert_eq!(mail.recipients().len(), 1);
    assert_eq!(mail.recipients()[0].mailbox(), "recipient@example.com");

    server.shutdown(true).await;
}

#[tokio::test]
async fn test_multipart_arrives_intact() {
    let (server, addr, mut rx) = start_server(None).await;
    let plain = "Hêlló, wörld!\r\n\r\n.\r\n";
    let html = "<p>Hêlló, wörld!</p>\r\n<p>.</p>";

    let mut client = connect(addr).await;
    client.hello().await.unwrap();

    let mail = Mail::compose(Address::with_name("Sender", "sender@example.com").unwrap())
        .to(address("recipient@example.com"))
        .subject("Multipart")
        .with_content(
            Multipart::new()
                .with_part(Text::plain(plain))
                .with_part(Text::html(html)),
        );
    client.send_mail(&mail).await.unwrap();

    let (_, received) = next_mail(&mut rx).await;
    assert_eq!(received.headers().get("subject"), Some("Multipart"));
    assert!(received.headers().contains("date"));

    let Some(Content::Multipart(multipart)) = received.content() else {
        panic!("expected multipart, got {:?}", received.content());
    };
    assert_eq!(multipart.sub_type(), "alternative");
    assert_eq!(multipart.parts().len(), 2);

    let Content::Text(first) = &multipart.parts()[0] else {
        panic!("expected text part");
    };
    assert_eq!(first.media_type(), "text/plain");
    assert_eq!(first.body(), plain);

    let Content::Text(second) = &multipart.parts()[1] else {
        panic!("expected text part");
    };
    assert_eq!(second.media_type(), "text/html");
    assert_eq!(second.body(), html);

    server.shutdown(true).await;
}

#[tokio::test]
async fn test_attachment_arrives_intact() {
    let (server, addr, mut rx) = start_server(None).await;
    let bytes: Vec<u8> = (0..=255).cycle().take(1000).collect();

    let mut client = connect(addr).await;
    client.hello().await.unwrap();
    client.mail_from(&address("sender@example.com")).await.unwrap();
    client.to(&address("recipient@example.com")).await.unwrap();
    client.subject("Report");
    let reply = client
        .send(&Content::from(
            Multipart::with_sub_type("mixed")
                .with_part(Text::plain("See attached."))
                .with_part(courier_mime::Attachment::new(
                    "application/octet-stream",
                    Some("report data.bin"),
                    bytes.clone(),
                )),
        ))
        .await
        .unwrap();
    assert_eq!(reply.code.as_u16(), 250);

    let (_, received) = next_mail(&mut rx).await;
    assert_eq!(received.headers().get("subject"), Some("Report"));
    assert_eq!(received.headers().get("to"), Some("recipient@example.com"));

    let Some(Content::Multipart(multipart)) = received.content() else {
        panic!("expected multipart");
    };
    assert_eq!(multipart.sub_type(), "mixed");
    let Content::Attachment(attachment) = &multipart.parts()[1] else {
        panic!("expected attachment");
    };
    assert_eq!(attachment.filename(), Some("report_data.bin"));
    assert_eq!(attachment.bytes(), bytes.as_slice());

    server.shutdown(true).await;
}

#[tokio::test]
async fn test_shutdown_sends_421() {
    let (server, addr, _rx) = start_server(None).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    assert!(line.starts_with("220 "));

    write.write_all(b"HELO client.test\r\n").await.unwrap();
    line.clear();
    reader.read_line(&mut line).await.unwrap();
    assert!(line.starts_with("250 "));
    assert_eq!(server.session_count(), 1);

    server.shutdown(true).await;

    line.clear();
    reader.read_line(&mut line).await.unwrap();
    assert!(line.starts_with("421 "), "got {line:?}");
    assert!(!server.is_online());
    assert_eq!(server.session_count(), 0);

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_delivery_through_resolver() {
    let (server, addr, mut rx) = start_server(None).await;
    let resolver = StaticResolver::new()
        .with_record("one.test", 10, "127.0.0.1")
        .with_record("two.test", 10, "127.0.0.1");
    let config = Config::builder()
        .security(Security::Disabled)
        .ports([addr.port()])
        .build();

    let reply = delivery::send_mail(
        address("sender@example.com"),
        address("someone@one.test"),
        "Direct",
        Text::plain("Delivered directly"),
        &resolver,
        &config,
    )
    .await
    .unwrap();
    assert_eq!(reply.code.as_u16(), 250);

    let (_, mail) = next_mail(&mut rx).await;
    assert_eq!(mail.recipients()[0].mailbox(), "someone@one.test");
    assert_eq!(mail.headers().get("subject"), Some("Direct"));

    // One transaction per domain, each with only its own recipients.
    let mail = Mail::compose(address("sender@example.com"))
        .to(address("a@one.test"))
        .to(address("b@two.test"))
        .bcc(address("c@one.test"))
        .with_content(Text::plain("Fan out"));
    let replies = delivery::deliver(&mail, &resolver, &config).await.unwrap();
    assert_eq!(replies.len(), 2);

    let (_, first) = next_mail(&mut rx).await;
    let first: Vec<&str> = first.recipients().iter().map(Address::mailbox).collect();
    assert_eq!(first, vec!["a@one.test", "c@one.test"]);
    let (_, second) = next_mail(&mut rx).await;
    assert_eq!(second.recipients()[0].mailbox(), "b@two.test");

    server.shutdown(true).await;
}

mod tls {
    use super::*;

    struct Material {
        acceptor: TlsAcceptor,
        client: Config,
    }

    fn material(security: Security) -> Material {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let der = CertificateDer::from(cert.serialize_der().unwrap());
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));
        let acceptor = server::tls::acceptor_from_der(vec![der.clone()], key).unwrap();

        let mut roots = rustls::RootCertStore::empty();
        roots.add(der).unwrap();
        let tls = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        let client = Config::builder()
            .client_hostname("client.test")
            .security(security)
            .reply_timeout(Duration::from_secs(5))
            .tls(Arc::new(tls))
            .build();
        Material { acceptor, client }
    }

    async fn connect_localhost(addr: SocketAddr, config: Config) -> Client {
        let tcp = TcpStream::connect(addr).await.unwrap();
        Client::from_stream(SmtpStream::new(tcp), "localhost", config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_starttls_upgrade() {
        let Material { acceptor, client } = material(Security::Required);
        let (server, addr, mut rx) = start_server(Some(acceptor)).await;

        let mut client = connect_localhost(addr, client).await;
        client.hello().await.unwrap();
        assert!(client.is_encrypted());
        assert!(client.is_extended());
        assert!(!client.server_info().supports_starttls());

        let mail = Mail::compose(address("sender@example.com"))
            .to(address("recipient@example.com"))
            .with_content(Text::plain("Secret"));
        client.send_mail(&mail).await.unwrap();

        let (session, _) = next_mail(&mut rx).await;
        assert!(session.is_encrypted());
        assert!(session.is_extended());
        assert_eq!(session.hostname(), Some("client.test"));

        client.quit().await.unwrap();
        server.shutdown(true).await;
    }

    #[tokio::test]
    async fn test_starttls_clears_identification() {
        let Material { acceptor, client } = material(Security::Disabled);
        let (server, addr, _rx) = start_server(Some(acceptor)).await;

        let mut client = connect_localhost(addr, client).await;
        client.hello().await.unwrap();
        assert!(!client.is_encrypted());
        assert!(client.server_info().supports_starttls());

        client.starttls().await.unwrap();
        assert!(client.is_encrypted());
        assert!(!client.is_extended());

        // The server forgot the pre-upgrade EHLO.
        let err = client.mail_from(&address("sender@example.com")).await.unwrap_err();
        assert!(matches!(err, Error::Smtp { code: 503, .. }));

        client.hello().await.unwrap();
        assert!(!client.server_info().supports_starttls());
        client.mail_from(&address("sender@example.com")).await.unwrap();

        let err = client.starttls().await.unwrap_err();
        assert!(matches!(err, Error::TlsNegotiation(_)));

        server.shutdown(true).await;
    }

    #[tokio::test]
    async fn test_required_tls_without_offer() {
        let Material { client, .. } = material(Security::Required);
        let (server, addr, _rx) = start_server(None).await;

        let mut client = connect_localhost(addr, client).await;
        let err = client.hello().await.unwrap_err();
        assert!(matches!(err, Error::TlsNegotiation(_)));

        server.shutdown(true).await;
    }
}

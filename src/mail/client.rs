//! Just enough SMTP to hand a batch of messages to a relay: EHLO, optional
//! STARTTLS and AUTH PLAIN, then MAIL/RCPT/DATA per message.

use crate::internal;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use rustls_pemfile::certs;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// STARTTLS trust settings. Only the CA certificates in `ca_file` are trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub ca_file: PathBuf,
    /// Name checked against the server certificate; defaults to the mail host.
    pub server_name: Option<String>,
}

impl TlsSettings {
    #[must_use]
    pub fn new(ca_file: impl Into<PathBuf>) -> Self {
        Self {
            ca_file: ca_file.into(),
            server_name: None,
        }
    }

    fn client_config(&self) -> Result<Arc<ClientConfig>, crate::Error> {
        let path = shellexpand::tilde(&self.ca_file.to_string_lossy()).into_owned();
        let mut reader = BufReader::new(File::open(&path)?);
        let ca_certs: Vec<CertificateDer<'static>> = certs(&mut reader)
            .collect::<Result<_, _>>()
            .map_err(|e| crate::Error::Tls(format!("invalid CA PEM {path}: {e}")))?;
        if ca_certs.is_empty() {
            return Err(crate::Error::Tls(format!("{path} contains no certificates")));
        }

        let mut roots = RootCertStore::empty();
        for cert in ca_certs {
            roots
                .add(cert)
                .map_err(|e| crate::Error::Tls(format!("bad CA cert: {e}")))?;
        }

        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Arc::new(config))
    }
}

enum Stream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
    Closed,
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(s) => s.read(buf),
            Self::Tls(s) => s.read(buf),
            Self::Closed => Err(io::ErrorKind::NotConnected.into()),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(s) => s.write(buf),
            Self::Tls(s) => s.write(buf),
            Self::Closed => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(s) => s.flush(),
            Self::Tls(s) => s.flush(),
            Self::Closed => Ok(()),
        }
    }
}

/// Server reply: numeric code plus the text of every line.
#[derive(Debug, Clone)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

/// One SMTP session.
pub struct SmtpClient {
    reader: BufReader<Stream>,
    host: String,
    extensions: Vec<String>,
}

impl SmtpClient {
    /// Connects, reads the greeting and sends EHLO.
    ///
    /// # Errors
    /// Connection failures or an unexpected greeting.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, crate::Error> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| crate::Error::Smtp(format!("cannot resolve {host}:{port}")))?;
        let tcp = TcpStream::connect_timeout(&addr, timeout)?;
        tcp.set_read_timeout(Some(timeout))?;
        tcp.set_write_timeout(Some(timeout))?;
        internal::trace("SMTP", &format!("Connected to {host}:{port}"));

        let mut client = Self {
            reader: BufReader::new(Stream::Plain(tcp)),
            host: host.to_string(),
            extensions: Vec::new(),
        };
        client.expect(&[220])?;
        client.ehlo()?;
        Ok(client)
    }

    /// EHLO keywords advertised by the server, upper-cased.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn ehlo(&mut self) -> Result<(), crate::Error> {
        let local = nix::unistd::gethostname()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        self.command(&format!("EHLO {local}"))?;
        let reply = self.expect(&[250])?;
        self.extensions = reply
            .lines
            .iter()
            .skip(1)
            .map(|l| l.to_uppercase())
            .collect();
        Ok(())
    }

    /// Upgrades the session to TLS and repeats EHLO.
    ///
    /// # Errors
    /// The server refuses STARTTLS or the handshake fails.
    pub fn starttls(&mut self, settings: &TlsSettings) -> Result<(), crate::Error> {
        self.command("STARTTLS")?;
        self.expect(&[220])?;

        let config = settings.client_config()?;
        let name = settings
            .server_name
            .clone()
            .unwrap_or_else(|| self.host.clone());
        let server_name =
            ServerName::try_from(name).map_err(|e| crate::Error::Tls(e.to_string()))?;
        let conn = ClientConnection::new(config, server_name)?;

        let old = std::mem::replace(&mut self.reader, BufReader::new(Stream::Closed));
        let Stream::Plain(tcp) = old.into_inner() else {
            return Err(crate::Error::Tls("session is already encrypted".into()));
        };
        self.reader = BufReader::new(Stream::Tls(Box::new(StreamOwned::new(conn, tcp))));
        internal::trace("SMTP", "TLS established");
        self.ehlo()
    }

    /// AUTH PLAIN.
    ///
    /// # Errors
    /// Credentials rejected.
    pub fn login(&mut self, username: &str, password: &str) -> Result<(), crate::Error> {
        let token = STANDARD.encode(format!("\0{username}\0{password}"));
        self.command(&format!("AUTH PLAIN {token}"))?;
        self.expect(&[235])?;
        Ok(())
    }

    /// Sends one message. `data` is the rendered message; it is dot-stuffed here.
    ///
    /// # Errors
    /// Any rejected command, or no recipients.
    pub fn send_mail(
        &mut self,
        from: &str,
        recipients: &[String],
        data: &str,
    ) -> Result<(), crate::Error> {
        if recipients.is_empty() {
            return Err(crate::Error::Smtp("message has no recipients".into()));
        }
        self.command(&format!("MAIL FROM:<{from}>"))?;
        self.expect(&[250])?;
        for rcpt in recipients {
            self.command(&format!("RCPT TO:<{rcpt}>"))?;
            self.expect(&[250, 251])?;
        }
        self.command("DATA")?;
        self.expect(&[354])?;

        let mut payload = String::with_capacity(data.len() + 64);
        for line in data.lines() {
            if line.starts_with('.') {
                payload.push('.');
            }
            payload.push_str(line);
            payload.push_str("\r\n");
        }
        payload.push_str(".\r\n");
        let stream = self.reader.get_mut();
        stream.write_all(payload.as_bytes())?;
        stream.flush()?;
        self.expect(&[250])?;
        Ok(())
    }

    /// Ends the session politely.
    ///
    /// # Errors
    /// I/O failures while sending QUIT.
    pub fn quit(mut self) -> Result<(), crate::Error> {
        self.command("QUIT")?;
        self.expect(&[221])?;
        Ok(())
    }

    fn command(&mut self, line: &str) -> Result<(), crate::Error> {
        if line.starts_with("AUTH") {
            internal::trace("SMTP", "> AUTH PLAIN ****");
        } else {
            internal::trace("SMTP", &format!("> {line}"));
        }
        let stream = self.reader.get_mut();
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\r\n")?;
        stream.flush()?;
        Ok(())
    }

    fn read_reply(&mut self) -> Result<Reply, crate::Error> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(crate::Error::Smtp("connection closed by server".into()));
            }
            let line = line.trim_end_matches(['\r', '\n']);
            internal::trace("SMTP", &format!("< {line}"));
            if line.len() < 3 {
                return Err(crate::Error::Smtp(format!("malformed reply: {line}")));
            }
            let code: u16 = line
                .get(..3)
                .and_then(|c| c.parse().ok())
                .ok_or_else(|| crate::Error::Smtp(format!("malformed reply: {line}")))?;
            let more = line.as_bytes().get(3) == Some(&b'-');
            lines.push(line.get(4..).unwrap_or_default().to_string());
            if !more {
                return Ok(Reply { code, lines });
            }
        }
    }

    fn expect(&mut self, codes: &[u16]) -> Result<Reply, crate::Error> {
        let reply = self.read_reply()?;
        if codes.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(crate::Error::Smtp(format!(
                "unexpected reply {}: {}",
                reply.code,
                reply.lines.join(" ")
            )))
        }
    }
}

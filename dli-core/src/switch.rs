//! Switch session: read, stop, write, verify and run against one endpoint.
//!
//! Operations are strictly sequential. A write always stops scripting first; the new script
//! is only started after it has been read back and verified.

use crate::error::Error;
use crate::listing::{LastTableParser, ListingParser, RemoteScript};
use crate::protocol::{Command, Request};
use crate::script::{FixedScript, SCRIPT_CAPACITY};
use crate::transport::{self, Endpoint, Transport};
use crate::verify::{self, Mismatch, Verification};

/// End state of a full sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Script verified and a thread started at `line`.
    Running { line: usize },
    /// Script written but the read-back differs; scripting is left stopped.
    Unverified(Mismatch),
}

pub struct Switch<T> {
    endpoint: Endpoint,
    transport: T,
    parser: Box<dyn ListingParser>,
}

impl<T: Transport> Switch<T> {
    pub fn new(endpoint: Endpoint, transport: T) -> Self {
        Self {
            endpoint,
            transport,
            parser: Box::new(LastTableParser::new()),
        }
    }

    /// Replace the listing scraper.
    pub fn with_parser(mut self, parser: Box<dyn ListingParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Read the stored script. Safe at any time, even mid-write of another invocation.
    pub async fn read(&self) -> Result<RemoteScript, Error> {
        let request = Request::read_listing();
        let response = transport::request(&self.transport, &self.endpoint, &request).await?;
        self.parser.parse(&response.body)
    }

    /// Stop all script threads. Idempotent.
    pub async fn stop(&self) -> Result<(), Error> {
        tracing::info!(host = %self.endpoint.host, "stopping scripting");
        self.send(Command::Stop).await
    }

    /// Overwrite every line, in order, one request per line. Call `stop` first.
    /// `progress` receives the fraction written (0.0..=1.0) after each line.
    pub async fn write<F>(&self, script: &FixedScript, mut progress: F) -> Result<(), Error>
    where
        F: FnMut(f64),
    {
        tracing::info!(host = %self.endpoint.host, lines = script.len(), "writing script");
        let total = script.len();
        for (line, text) in script.numbered() {
            self.send(Command::Edit {
                line,
                text: text.to_string(),
            })
            .await?;
            progress(line as f64 / total as f64);
        }
        Ok(())
    }

    /// Read the script back and compare it with `expected`.
    pub async fn verify(&self, expected: &FixedScript) -> Result<Verification, Error> {
        let actual = self.read().await?;
        let result = verify::compare(expected, &actual);
        if let Verification::Mismatch(m) = &result {
            tracing::warn!(
                index = m.index,
                expected = %m.expected,
                actual = %m.actual,
                "verification failed"
            );
        }
        Ok(result)
    }

    /// Start a script thread at `line` (1-based).
    pub async fn run(&self, line: usize) -> Result<(), Error> {
        check_line(line)?;
        tracing::info!(host = %self.endpoint.host, line, "starting scripting");
        self.send(Command::Run { line }).await
    }

    /// Stop, write, verify, and only on a match start at `start_line`.
    /// An interrupted sync leaves scripting stopped; running it again recovers.
    pub async fn sync<F>(
        &self,
        script: &FixedScript,
        start_line: usize,
        progress: F,
    ) -> Result<SyncOutcome, Error>
    where
        F: FnMut(f64),
    {
        check_line(start_line)?;
        self.stop().await?;
        self.write(script, progress).await?;
        match self.verify(script).await? {
            Verification::Match => {
                self.run(start_line).await?;
                Ok(SyncOutcome::Running { line: start_line })
            }
            Verification::Mismatch(m) => Ok(SyncOutcome::Unverified(m)),
        }
    }

    async fn send(&self, command: Command) -> Result<(), Error> {
        transport::request(&self.transport, &self.endpoint, &command.request()).await?;
        Ok(())
    }
}

fn check_line(line: usize) -> Result<(), Error> {
    if line == 0 || line > SCRIPT_CAPACITY {
        return Err(Error::InvalidLine {
            line,
            max: SCRIPT_CAPACITY,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::render_listing;
    use crate::protocol::{Method, COMMAND_PATH};
    use crate::script::{encode, TERMINATOR};
    use crate::transport::{Response, SendError};
    use std::sync::Mutex;
    use std::time::Duration;

    /// A switch that stores exactly what it is told and renders `SLEEP n` as `SLEEP n sec`.
    struct FakeSwitch {
        lines: Mutex<Vec<String>>,
        log: Mutex<Vec<Request>>,
        /// Number of leading send attempts that fail with a connection reset.
        resets: Mutex<u32>,
        /// Store edits with this text instead of the requested one.
        corrupt_line: Option<(usize, String)>,
    }

    impl FakeSwitch {
        fn new() -> Self {
            Self {
                lines: Mutex::new(vec!["OLD".to_string(); SCRIPT_CAPACITY]),
                log: Mutex::new(Vec::new()),
                resets: Mutex::new(0),
                corrupt_line: None,
            }
        }

        fn requests(&self) -> Vec<Request> {
            self.log.lock().unwrap().clone()
        }

        fn count(&self, pred: impl Fn(&Request) -> bool) -> usize {
            self.requests().iter().filter(|r| pred(r)).count()
        }

        fn render(&self) -> String {
            let shown: Vec<String> = self
                .lines
                .lock()
                .unwrap()
                .iter()
                .map(|l| {
                    if l.starts_with("SLEEP ") {
                        format!("{} sec", l)
                    } else {
                        l.clone()
                    }
                })
                .collect();
            render_listing(&shown)
        }
    }

    impl Transport for FakeSwitch {
        async fn send(&self, _: &Endpoint, request: &Request) -> Result<Response, SendError> {
            {
                let mut resets = self.resets.lock().unwrap();
                if *resets > 0 {
                    *resets -= 1;
                    return Err(SendError::ConnectionReset("reset".to_string()));
                }
            }
            self.log.lock().unwrap().push(request.clone());
            let body = match request.method {
                Method::Get => self.render(),
                Method::Post => {
                    for (key, value) in &request.form {
                        if let Some(n) = key.strip_prefix("edit") {
                            let line: usize = n.parse().unwrap();
                            let text = match &self.corrupt_line {
                                Some((bad, text)) if *bad == line => text.clone(),
                                _ => value.clone(),
                            };
                            self.lines.lock().unwrap()[line - 1] = text;
                        }
                    }
                    "OK".to_string()
                }
            };
            Ok(Response {
                status: 200,
                url: format!("http://switch.local{}", request.path),
                body,
            })
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint {
            host: "switch.local".to_string(),
            user: "admin".to_string(),
            password: "1234".to_string(),
            timeout: Duration::from_secs(3),
            attempts: 3,
        }
    }

    fn is_edit(r: &Request) -> bool {
        r.form.iter().any(|(k, _)| k.starts_with("edit"))
    }

    #[tokio::test]
    async fn sync_stops_writes_verifies_and_runs() {
        let script = encode(["ON 1", "SLEEP 5"]).unwrap();
        let switch = Switch::new(endpoint(), FakeSwitch::new());
        let mut fractions = Vec::new();
        let outcome = switch.sync(&script, 1, |f| fractions.push(f)).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Running { line: 1 });

        let fake = &switch.transport;
        let log = fake.requests();
        assert_eq!(log[0], Command::Stop.request());
        assert_eq!(fake.count(|r| *r == Command::Stop.request()), 1);
        assert_eq!(fake.count(is_edit), SCRIPT_CAPACITY);
        assert_eq!(
            log[1].form,
            vec![("edit001".to_string(), "ON 1".to_string())]
        );
        assert_eq!(
            log[2].form,
            vec![("edit002".to_string(), "SLEEP 5".to_string())]
        );
        assert_eq!(
            log[SCRIPT_CAPACITY].form,
            vec![("edit127".to_string(), TERMINATOR.to_string())]
        );
        assert_eq!(log[SCRIPT_CAPACITY + 1].method, Method::Get);
        assert_eq!(log.last().unwrap(), &Command::Run { line: 1 }.request());
        assert_eq!(log.len(), 1 + SCRIPT_CAPACITY + 1 + 1);

        assert_eq!(fractions.len(), SCRIPT_CAPACITY);
        assert_eq!(*fractions.last().unwrap(), 1.0);
        assert!(fractions.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn round_trip_read_matches_written_script() {
        let script = encode(["ON 1", "SLEEP 10", "OFF 1", "GOTO 1"]).unwrap();
        let switch = Switch::new(endpoint(), FakeSwitch::new());
        switch.stop().await.unwrap();
        switch.write(&script, |_| {}).await.unwrap();
        let remote = switch.read().await.unwrap();
        assert_eq!(remote.lines()[1], "SLEEP 10 sec");
        assert!(switch.verify(&script).await.unwrap().is_match());
    }

    #[tokio::test]
    async fn mismatch_leaves_scripting_stopped() {
        let mut fake = FakeSwitch::new();
        fake.corrupt_line = Some((2, "SLEEP 6".to_string()));
        let switch = Switch::new(endpoint(), fake);
        let script = encode(["ON 1", "SLEEP 5"]).unwrap();
        let outcome = switch.sync(&script, 1, |_| {}).await.unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Unverified(Mismatch {
                index: 1,
                expected: "SLEEP 5".to_string(),
                actual: "SLEEP 6 sec".to_string(),
            })
        );
        assert_eq!(
            switch
                .transport
                .count(|r| r.form.iter().any(|(k, _)| k.starts_with("run"))),
            0
        );
    }

    #[tokio::test]
    async fn sync_survives_transient_resets() {
        let fake = FakeSwitch::new();
        *fake.resets.lock().unwrap() = 2;
        let switch = Switch::new(endpoint(), fake);
        let script = encode(["ON 2"]).unwrap();
        let outcome = switch.sync(&script, 1, |_| {}).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Running { line: 1 });
    }

    #[tokio::test]
    async fn run_line_out_of_range_sends_nothing() {
        let switch = Switch::new(endpoint(), FakeSwitch::new());
        let script = encode(["ON 1"]).unwrap();
        assert!(matches!(
            switch.sync(&script, 0, |_| {}).await,
            Err(Error::InvalidLine { line: 0, .. })
        ));
        assert!(matches!(
            switch.run(SCRIPT_CAPACITY + 1).await,
            Err(Error::InvalidLine { .. })
        ));
        assert!(switch.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn run_uses_plain_command_path() {
        let switch = Switch::new(endpoint(), FakeSwitch::new());
        switch.run(12).await.unwrap();
        let log = switch.transport.requests();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].path, COMMAND_PATH);
        assert_eq!(log[0].form, vec![("run012".to_string(), "run".to_string())]);
    }

    struct Unrecognised;

    impl ListingParser for Unrecognised {
        fn parse(&self, _: &str) -> Result<RemoteScript, Error> {
            Err(Error::UnexpectedPage)
        }
    }

    #[tokio::test]
    async fn unexpected_page_aborts_before_run() {
        let switch = Switch::new(endpoint(), FakeSwitch::new()).with_parser(Box::new(Unrecognised));
        let script = encode(["ON 1"]).unwrap();
        assert!(matches!(
            switch.sync(&script, 1, |_| {}).await,
            Err(Error::UnexpectedPage)
        ));
        // One GET only: parse failures are not retried.
        assert_eq!(
            switch.transport.count(|r| r.method == Method::Get),
            1
        );
        assert_eq!(
            switch
                .transport
                .count(|r| r.form.iter().any(|(k, _)| k.starts_with("run"))),
            0
        );
    }
}

//! Switch pseudo-API: the listing page and the form-encoded script commands.

use std::fmt;

/// Rendered page that carries the script listing.
pub const READ_PATH: &str = "/script.htm";

/// Some commands are only accepted on `/script.cgi`, others on `/script`.
pub const CGI_COMMAND_PATH: &str = "/script.cgi";
pub const COMMAND_PATH: &str = "/script";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// One request against the switch. Host and credentials come from the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: &'static str,
    /// Form fields for POST; empty for GET.
    pub form: Vec<(String, String)>,
}

impl Request {
    /// GET of the script listing page.
    pub fn read_listing() -> Self {
        Self {
            method: Method::Get,
            path: READ_PATH,
            form: Vec::new(),
        }
    }
}

/// Script control commands. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Stop every running script thread.
    Stop,
    /// Replace the text of one line.
    Edit { line: usize, text: String },
    /// Start a thread at a line.
    Run { line: usize },
}

impl Command {
    pub fn path(&self) -> &'static str {
        match self {
            Command::Stop => CGI_COMMAND_PATH,
            Command::Edit { .. } | Command::Run { .. } => COMMAND_PATH,
        }
    }

    /// Form body; line numbers are zero-padded to three digits (`edit007`, `run001`).
    pub fn form(&self) -> Vec<(String, String)> {
        match self {
            Command::Stop => vec![("stop".to_string(), String::new())],
            Command::Edit { line, text } => vec![(format!("edit{:03}", line), text.clone())],
            Command::Run { line } => vec![(format!("run{:03}", line), "run".to_string())],
        }
    }

    pub fn request(&self) -> Request {
        Request {
            method: Method::Post,
            path: self.path(),
            form: self.form(),
        }
    }
}

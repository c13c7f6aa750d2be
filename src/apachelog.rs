//! Write HTTP access log files in the Combined Log Format (extended
//! Common Log Format) for access logs (Apache style), as per
//! <https://httpd.apache.org/docs/2.4/logs.html>.

use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write, stderr};
use std::panic;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::http_response_status_codes::HttpResponseStatusCode;
use crate::request::Request;
use crate::response::Response;
use crate::webutils::errorpage_from_status;
use crate::warn;

static MONTHS: &[&str; 12] = &["Jan", "Feb", "Mar", "Apr", "May", "Jun",
                                "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

// "06/Dec/2023:02:02:47 +0000"
pub fn write_time(
    outp: &mut impl Write,
    time: SystemTime
) -> Result<()> {
    let dt: DateTime<Utc> = DateTime::from(time);
    write!(outp, "{:02}/{}/{:04}:{:02}:{:02}:{:02} +0000",
           dt.day(), MONTHS[dt.month0() as usize], dt.year(),
           dt.hour(), dt.minute(), dt.second())?;
    Ok(())
}

/// What goes into a log line about the request, collected before the
/// request is handled (it might not even be parseable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessInfo {
    pub client_ip: String,
    pub request_line: String,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

impl From<&Request> for AccessInfo {
    fn from(request: &Request) -> Self {
        AccessInfo {
            client_ip: request.remote_addr()
                .map(|a| a.ip().to_string())
                .unwrap_or_else(|| "-".into()),
            request_line: request.request_line(),
            referer: request.header("referer").map(String::from),
            user_agent: request.header("user-agent").map(String::from),
        }
    }
}

// 18.134.151.89 - - [06/Dec/2023:02:02:47 +0000] "GET /wo/3.4 HTTP/1.1" 200 447 "-" "curl/7.88.1" 1.2ms

/// Write to access.log. The duration is appended to the Combined Log
/// Format fields.
pub fn write_combined(
    outp: &mut impl Write,
    info: &AccessInfo,
    duration: Duration,
    response: &Response,
) -> Result<()> {
    // Write the time when the log entry is made, not when the
    // request started
    let now = SystemTime::now();
    write!(outp, "{} - - [", info.client_ip)?;
    write_time(outp, now)?;
    writeln!(outp, "] {:?} {} {} {:?} {:?} {duration:?}",
             info.request_line,
             response.status.code(),
             response.content().len(),
             info.referer.as_deref().unwrap_or("-"),
             info.user_agent.as_deref().unwrap_or("-"))?;
    outp.flush()?;
    Ok(())
}

// [06/Dec/2023:03:40:39 +0000] [error] [client 45.95.147.204] "GET /wa/x HTTP/1.1" 3ms: ...

/// Write to error.log
pub fn write_error(
    outp: &mut impl Write,
    info: &AccessInfo,
    duration: Duration,
    err: &dyn Display,
) -> Result<()> {
    let now = SystemTime::now();
    write!(outp, "[")?;
    write_time(outp, now)?;
    writeln!(outp, "] [error] [client {}] {:?} {duration:?}: {err}",
             info.client_ip,
             info.request_line)?;
    outp.flush()?;
    Ok(())
}

/// Panic log to stderr.
fn write_panic_stderr(info: &AccessInfo, duration: Duration) {
    let mut outp = BufWriter::new(stderr().lock());
    // stderr is fed to a service collecting it anyway, hence no
    // timestamps.
    let _ = writeln!(&mut outp, "[panic] handling {:?} after {duration:?}",
                     info.request_line);
    let _ = outp.flush();
}


/// The log files to write to: access_log if a response was made,
/// error_log when the handler failed. The writers should do
/// buffering, the code calls flush once per entry.
pub struct Logs {
    pub access_log: Box<dyn Write + Send + Sync>,
    pub error_log: Box<dyn Write + Send + Sync>,
}

fn open_log_output(path: &Path) -> Result<Box<dyn Write + Send + Sync>> {
    let file = OpenOptions::new().create(true).append(true).open(path)
        .with_context(|| format!("opening log file {path:?} for appending"))?;
    Ok(Box::new(BufWriter::new(file)))
}

impl Logs {
    /// `access.log` and `error.log` in `logdir`, appended to.
    pub fn open_in_dir(logdir: &Path) -> Result<Arc<Mutex<Logs>>> {
        Ok(Arc::new(Mutex::new(Logs {
            access_log: open_log_output(&logdir.join("access.log"))?,
            error_log: open_log_output(&logdir.join("error.log"))?,
        })))
    }

    /// Both logs going to stderr.
    pub fn stderr() -> Arc<Mutex<Logs>> {
        Arc::new(Mutex::new(Logs {
            access_log: Box::new(stderr()),
            error_log: Box::new(stderr()),
        }))
    }
}


/// Runs `handler`, logs the outcome. An error from the handler is
/// answered with a 500 page; panics are noted on stderr and resumed.
pub fn log_combined<F>(
    info: &AccessInfo,
    logs: &Mutex<Logs>,
    handler: F
) -> Response
where
    F: FnOnce() -> Result<Response>,
{
    let start_instant = Instant::now();

    // Note that we always resume unwinding afterwards.
    let result = panic::catch_unwind(panic::AssertUnwindSafe(handler));
    let elapsed = start_instant.elapsed();

    // A panic while writing a log line leaves the writer usable.
    let mut logs = logs.lock().unwrap_or_else(|e| e.into_inner());
    match result {
        Ok(Ok(response)) => {
            if let Err(e) = write_combined(&mut logs.access_log, info, elapsed, &response) {
                warn!("could not write to access log: {e:#}")
            }
            response
        }
        Ok(Err(err)) => {
            if let Err(e) = write_error(&mut logs.error_log, info, elapsed,
                                        &format!("{err:#}")) {
                warn!("could not write to error log: {e:#}")
            }
            errorpage_from_status(HttpResponseStatusCode::InternalServerError500)
        }
        Err(payload) => {
            drop(logs);
            write_panic_stderr(info, elapsed);
            panic::resume_unwind(payload);
        }
    }
}

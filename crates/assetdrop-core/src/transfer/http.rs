//! libcurl-backed transfer source (single GET, follows redirects).

use std::cell::RefCell;
use std::str;
use std::time::Duration;

use crate::config::TransferConfig;

use super::{ResponseHead, TransferError, TransferSink, TransferSource};

/// Fetches with one libcurl easy handle per transfer.
#[derive(Debug, Clone, Default)]
pub struct CurlSource {
    cfg: TransferConfig,
}

impl CurlSource {
    pub fn new(cfg: TransferConfig) -> Self {
        Self { cfg }
    }

    fn configure(&self, easy: &mut curl::easy::Easy, url: &str) -> Result<(), curl::Error> {
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.useragent(concat!("assetdrop/", env!("CARGO_PKG_VERSION")))?;
        easy.connect_timeout(Duration::from_secs(self.cfg.connect_timeout_secs))?;
        // Abort if throughput stays below the limit for the window, rather than a
        // hard wall-clock cut for large files on slow links.
        easy.low_speed_limit(self.cfg.low_speed_limit_bytes)?;
        easy.low_speed_time(Duration::from_secs(self.cfg.low_speed_time_secs))?;
        easy.timeout(Duration::from_secs(self.cfg.timeout_secs))?;
        Ok(())
    }
}

/// Head fields accumulated from header lines. Reset on every status line so only
/// the final response after redirects counts.
#[derive(Default)]
struct HeadState {
    head: ResponseHead,
    began: bool,
    received: u64,
}

impl HeadState {
    fn header_line(&mut self, line: &str) {
        let line = line.trim_end();
        if line.starts_with("HTTP/") {
            let status = line
                .split_whitespace()
                .nth(1)
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            self.head = ResponseHead {
                status,
                ..ResponseHead::default()
            };
            return;
        }
        let Some((name, value)) = line.split_once(':') else {
            return;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            self.head.content_length = value.parse().ok();
        } else if name.eq_ignore_ascii_case("content-type") {
            self.head.content_type = Some(value.to_string());
        }
    }
}

impl TransferSource for CurlSource {
    fn fetch(&self, url: &str, sink: &mut dyn TransferSink) -> Result<ResponseHead, TransferError> {
        let mut easy = curl::easy::Easy::new();
        self.configure(&mut easy, url)?;

        let state = RefCell::new(HeadState::default());
        let sink = RefCell::new(sink);
        let sink_error: RefCell<Option<anyhow::Error>> = RefCell::new(None);

        let performed = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(line) = str::from_utf8(data) {
                    state.borrow_mut().header_line(line);
                }
                true
            })?;
            transfer.write_function(|data| {
                let mut st = state.borrow_mut();
                if !st.head.is_success() {
                    // Drain error bodies; the status is reported after perform.
                    return Ok(data.len());
                }
                let mut sink = sink.borrow_mut();
                if !st.began {
                    st.began = true;
                    sink.begin(&st.head);
                }
                match sink.write(data) {
                    Ok(()) => {
                        st.received += data.len() as u64;
                        Ok(data.len())
                    }
                    Err(e) => {
                        *sink_error.borrow_mut() = Some(e);
                        Ok(0) // abort transfer
                    }
                }
            })?;
            transfer.perform()
        };

        if let Some(e) = sink_error.into_inner() {
            return Err(TransferError::Sink(e));
        }
        performed?;

        let code = easy.response_code()?;
        let mut st = state.into_inner();
        if code != 0 {
            st.head.status = code;
        }
        if !st.head.is_success() {
            return Err(TransferError::Http(st.head.status));
        }
        if let Some(expected) = st.head.content_length {
            if st.received != expected {
                return Err(TransferError::PartialTransfer {
                    expected,
                    received: st.received,
                });
            }
        }
        if !st.began {
            sink.into_inner().begin(&st.head);
        }
        Ok(st.head)
    }
}

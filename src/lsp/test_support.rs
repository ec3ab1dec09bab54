use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use serde_json::Value;

/// Writer whose contents stay readable after it is handed to a `Client`
#[derive(Debug, Clone, Default)]
pub(crate) struct Capture(Rc<RefCell<Vec<u8>>>);

impl Capture {
    pub fn bytes(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }

    pub fn messages(&self) -> Vec<Value> {
        decode_frames(&self.bytes())
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Splits written output back into JSON bodies
pub(crate) fn decode_frames(mut bytes: &[u8]) -> Vec<Value> {
    let mut messages = Vec::new();
    while !bytes.is_empty() {
        let header_end = bytes
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("unterminated header");
        let header = std::str::from_utf8(&bytes[..header_end]).unwrap();
        let length: usize = header
            .strip_prefix("Content-Length: ")
            .expect("missing Content-Length")
            .parse()
            .unwrap();
        let body = &bytes[header_end + 4..header_end + 4 + length];
        messages.push(serde_json::from_slice(body).unwrap());
        bytes = &bytes[header_end + 4 + length..];
    }
    messages
}

// ABOUTME: Input and output ports: shared byte streams with one-byte pushback

use crate::error::SchError;
use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::rc::Rc;

struct InStream {
    src: Option<Box<dyn Read>>,
    pushback: Option<u8>,
}

/// An input port. The stream cell is shared so the same port value can be
/// stored in the heap, handed to the reader and closed, all while the port
/// object itself stays cheap to clone. Dropping the last clone of an open
/// port releases the underlying file handle.
#[derive(Clone)]
pub struct InPort {
    stream: Rc<RefCell<InStream>>,
}

impl InPort {
    fn from_reader(src: Box<dyn Read>) -> InPort {
        InPort {
            stream: Rc::new(RefCell::new(InStream {
                src: Some(src),
                pushback: None,
            })),
        }
    }

    pub fn stdin() -> InPort {
        InPort::from_reader(Box::new(io::stdin()))
    }

    pub fn open(path: &str) -> Result<InPort, SchError> {
        let file = File::open(path)
            .map_err(|e| SchError::io(format!("cannot open input file {}", path), e))?;
        Ok(InPort::from_reader(Box::new(BufReader::new(file))))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> InPort {
        InPort::from_reader(Box::new(Cursor::new(bytes)))
    }

    /// Consume and return the next byte, or `None` at end of input.
    pub fn next_byte(&self) -> Result<Option<u8>, SchError> {
        let mut stream = self.stream.borrow_mut();
        if let Some(b) = stream.pushback.take() {
            return Ok(Some(b));
        }
        let src = stream
            .src
            .as_mut()
            .ok_or_else(|| SchError::io("read", closed_port()))?;
        let mut buf = [0u8; 1];
        loop {
            match src.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SchError::io("read", e)),
            }
        }
    }

    /// Return the next byte without consuming it.
    pub fn peek_byte(&self) -> Result<Option<u8>, SchError> {
        let b = self.next_byte()?;
        if b.is_some() {
            self.stream.borrow_mut().pushback = b;
        }
        Ok(b)
    }

    /// Push one byte back onto the stream. Only a single byte of
    /// pushback is supported, matching what the reader needs.
    pub fn unread(&self, b: u8) {
        self.stream.borrow_mut().pushback = Some(b);
    }

    pub fn close(&self) {
        let mut stream = self.stream.borrow_mut();
        stream.src = None;
        stream.pushback = None;
    }
}

impl fmt::Debug for InPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<input-port>")
    }
}

/// An output port wrapping a shared writer, `None` once closed.
#[derive(Clone)]
pub struct OutPort {
    sink: Rc<RefCell<Option<Box<dyn Write>>>>,
}

impl OutPort {
    fn from_writer(sink: Box<dyn Write>) -> OutPort {
        OutPort {
            sink: Rc::new(RefCell::new(Some(sink))),
        }
    }

    pub fn stdout() -> OutPort {
        OutPort::from_writer(Box::new(io::stdout()))
    }

    pub fn create(path: &str) -> Result<OutPort, SchError> {
        let file = File::create(path)
            .map_err(|e| SchError::io(format!("cannot open output file {}", path), e))?;
        Ok(OutPort::from_writer(Box::new(BufWriter::new(file))))
    }

    /// Write the bytes and flush, so REPL output interleaves correctly.
    pub fn write_all(&self, bytes: &[u8]) -> Result<(), SchError> {
        let mut sink = self.sink.borrow_mut();
        let w = sink
            .as_mut()
            .ok_or_else(|| SchError::io("write", closed_port()))?;
        w.write_all(bytes)
            .and_then(|_| w.flush())
            .map_err(|e| SchError::io("write", e))
    }

    pub fn close(&self) -> Result<(), SchError> {
        if let Some(mut w) = self.sink.borrow_mut().take() {
            w.flush().map_err(|e| SchError::io("close", e))?;
        }
        Ok(())
    }
}

impl fmt::Debug for OutPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<output-port>")
    }
}

fn closed_port() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "port is closed")
}

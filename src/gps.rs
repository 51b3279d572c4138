use crate::error::RecorderError;
use serial2::SerialPort;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Bound on how long a single GPS read may block.
pub const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Raw GPS transport. `read_chunk` returning 0 means no data this call;
/// NMEA parsing is not this system's concern, chunks pass through verbatim.
pub trait GpsSource: Send {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// GPS receiver attached to a serial port.
pub struct SerialGps {
    port: SerialPort,
}

impl SerialGps {
    pub fn open(path: &Path, baud: u32) -> Result<Self, RecorderError> {
        let open = || -> io::Result<SerialPort> {
            let mut port = SerialPort::open(path, baud)?;
            port.set_read_timeout(READ_TIMEOUT)?;
            Ok(port)
        };

        let port = open().map_err(|source| RecorderError::GpsOpen {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(SerialGps { port })
    }
}

impl GpsSource for SerialGps {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if is_no_data(&e) => Ok(0),
            Err(e) => Err(e),
        }
    }
}

/// Read timeouts are the idle case, not an error.
fn is_no_data(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

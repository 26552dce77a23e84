// network/capture.rs - Frame I/O over a host-established TUN interface
use anyhow::{anyhow, Context, Result};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// Default MTU of the virtual interface
pub const DEFAULT_MTU: usize = 1500;

/// Frame source/sink configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// TUN device name (None when adopting an fd)
    pub interface: Option<String>,
    /// Already-established TUN file descriptor inherited from the host
    pub tun_fd: Option<RawFd>,
    /// Bytes to read per frame
    pub mtu: usize,
    /// Read timeout in milliseconds; bounds stop latency
    pub timeout_ms: i32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: None,
            tun_fd: None,
            mtu: DEFAULT_MTU,
            timeout_ms: 150, // keep stop requests responsive
        }
    }
}

/// Frame-level view of the virtual interface.
///
/// `read_frame` returns `Ok(None)` on timeout so the caller can observe
/// cancellation between reads; `write_frame` must accept frames independent
/// of read timing.
pub trait FrameIo: Send {
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>>;
    fn write_frame(&mut self, frame: &[u8]) -> Result<()>;
}

/// A TUN device carrying raw IP datagrams (no link-layer header).
///
/// The fd is owned exclusively and closed on drop, on every exit path.
pub struct TunInterface {
    fd: OwnedFd,
    name: String,
    mtu: usize,
    timeout_ms: i32,
}

impl TunInterface {
    /// Attach to a named TUN device, e.g. `tun0`.
    ///
    /// Requires CAP_NET_ADMIN unless the device is persistent and owned by
    /// the current user. Only supported on Linux; other hosts must hand over
    /// an established fd via [`TunInterface::from_fd`].
    #[cfg(target_os = "linux")]
    pub fn open(name: &str, mtu: usize, timeout_ms: i32) -> Result<Self> {
        const TUNSETIFF: libc::c_ulong = 0x4004_54ca;
        const IFF_TUN: libc::c_short = 0x0001;
        const IFF_NO_PI: libc::c_short = 0x1000;

        if name.is_empty() || name.len() >= libc::IFNAMSIZ {
            return Err(anyhow!("invalid TUN device name: '{}'", name));
        }

        let fd = unsafe {
            libc::open(
                c"/dev/net/tun".as_ptr(),
                libc::O_RDWR | libc::O_CLOEXEC,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error())
                .context("opening /dev/net/tun (are you missing CAP_NET_ADMIN?)");
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };
        for (dst, src) in ifr.ifr_name.iter_mut().zip(name.as_bytes()) {
            *dst = *src as libc::c_char;
        }
        ifr.ifr_ifru.ifru_flags = IFF_TUN | IFF_NO_PI;

        let ret = unsafe { libc::ioctl(fd.as_raw_fd(), TUNSETIFF as _, &mut ifr) };
        if ret < 0 {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("attaching to TUN device '{}'", name));
        }

        log::info!("attached to TUN device '{}' (mtu {})", name, mtu);
        Ok(Self {
            fd,
            name: name.to_string(),
            mtu,
            timeout_ms,
        })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn open(name: &str, _mtu: usize, _timeout_ms: i32) -> Result<Self> {
        Err(anyhow!(
            "opening TUN device '{}' by name is only supported on Linux; pass an established fd",
            name
        ))
    }

    /// Adopt an already-established TUN file descriptor.
    ///
    /// Takes ownership: the fd is closed when the interface is dropped.
    pub fn from_fd(fd: RawFd, mtu: usize, timeout_ms: i32) -> Result<Self> {
        if fd < 0 {
            return Err(anyhow!("invalid TUN file descriptor: {}", fd));
        }

        log::info!("adopted TUN file descriptor {} (mtu {})", fd, mtu);
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
            name: format!("fd:{}", fd),
            mtu,
            timeout_ms,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FrameIo for TunInterface {
    /// Read the next frame, returning None on timeout
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut pollfd = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        let ready = unsafe { libc::poll(&mut pollfd, 1, self.timeout_ms) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(None);
            }
            return Err(err).context("polling TUN device");
        }
        if ready == 0 {
            return Ok(None); // timeout
        }

        let mut buf = vec![0u8; self.mtu];
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if matches!(
                err.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ) {
                return Ok(None);
            }
            return Err(err).context("reading from TUN device");
        }

        buf.truncate(n as usize);
        Ok(Some(buf))
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let n = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error()).context("writing to TUN device");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.mtu, 1500);
        assert!(config.interface.is_none());
        assert!(config.tun_fd.is_none());
    }

    #[test]
    fn test_negative_fd_rejected() {
        assert!(TunInterface::from_fd(-1, DEFAULT_MTU, 150).is_err());
    }
}

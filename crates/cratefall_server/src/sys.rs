//! # Socket and Epoll Primitives
//!
//! Thin safe wrappers over the libc calls the reactor and pump depend on:
//! `SO_REUSEPORT` listeners, non-blocking `recv`/`send` with
//! `MSG_DONTWAIT | MSG_NOSIGNAL`, and a private epoll instance per worker.
//!
//! All `unsafe` in the crate lives in this module; every block carries a
//! SAFETY note.

use std::io;
use std::os::unix::io::RawFd;

/// Result of a non-blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    /// `n` bytes were read into the buffer.
    Data(usize),
    /// The socket has no data right now (`EAGAIN`/`EWOULDBLOCK`).
    WouldBlock,
    /// Orderly end of stream.
    Closed,
}

/// Result of a non-blocking write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOutcome {
    /// `n` bytes were accepted by the kernel.
    Wrote(usize),
    /// The socket buffer is full (`EAGAIN`/`EWOULDBLOCK`).
    WouldBlock,
}

fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

fn set_opt(fd: RawFd, level: libc::c_int, opt: libc::c_int, value: libc::c_int) -> io::Result<()> {
    // SAFETY: `value` outlives the call and optlen matches its size.
    let ret = unsafe {
        libc::setsockopt(
            fd,
            level,
            opt,
            std::ptr::addr_of!(value).cast(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    cvt(ret).map(|_| ())
}

/// Creates a non-blocking TCP listener bound to `0.0.0.0:port`.
///
/// Address and port reuse are enabled so every worker can own an
/// independent listener on the same port; Nagle is disabled.
pub(crate) fn listener(port: u16, backlog: i32) -> io::Result<RawFd> {
    // SAFETY: plain socket(2) call; the fd is owned by the caller.
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
    let fd = cvt(fd)?;

    let setup = (|| {
        set_opt(fd, libc::SOL_SOCKET, libc::SO_REUSEADDR, 1)?;
        set_opt(fd, libc::SOL_SOCKET, libc::SO_REUSEPORT, 1)?;
        set_opt(fd, libc::IPPROTO_TCP, libc::TCP_NODELAY, 1)?;

        // SAFETY: sockaddr_in is a plain-old-data struct; zeroed is a
        // valid initial state.
        let mut addr: libc::sockaddr_in = unsafe { std::mem::zeroed() };
        addr.sin_family = libc::AF_INET as libc::sa_family_t;
        addr.sin_addr.s_addr = libc::INADDR_ANY;
        addr.sin_port = port.to_be();

        // SAFETY: `addr` is a valid sockaddr_in for the duration of the call.
        let ret = unsafe {
            libc::bind(
                fd,
                std::ptr::addr_of!(addr).cast(),
                std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        cvt(ret)?;

        // SAFETY: fd is a bound stream socket.
        cvt(unsafe { libc::listen(fd, backlog) })?;
        set_nonblocking(fd)?;
        Ok(())
    })();

    match setup {
        Ok(()) => Ok(fd),
        Err(e) => {
            close(fd);
            Err(e)
        }
    }
}

/// Accepts one pending connection, or `None` when the queue is drained.
pub(crate) fn accept(listener: RawFd) -> io::Result<Option<RawFd>> {
    // SAFETY: accept4 with null address pointers is valid; we do not need
    // the peer address.
    let ret = unsafe {
        libc::accept4(
            listener,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            libc::SOCK_CLOEXEC,
        )
    };
    if ret >= 0 {
        return Ok(Some(ret));
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock {
        Ok(None)
    } else {
        Err(err)
    }
}

/// Switches a descriptor to non-blocking mode.
pub(crate) fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: F_GETFL/F_SETFL on an owned fd.
    unsafe {
        let flags = cvt(libc::fcntl(fd, libc::F_GETFL, 0))?;
        cvt(libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK))?;
    }
    Ok(())
}

/// Disables Nagle on an accepted or upgraded socket.
pub(crate) fn set_nodelay(fd: RawFd) -> io::Result<()> {
    set_opt(fd, libc::IPPROTO_TCP, libc::TCP_NODELAY, 1)
}

/// Requests a larger kernel send buffer for a stream subscriber.
pub(crate) fn set_send_buffer(fd: RawFd, bytes: usize) -> io::Result<()> {
    set_opt(fd, libc::SOL_SOCKET, libc::SO_SNDBUF, bytes as libc::c_int)
}

/// Non-blocking read into `buf`.
pub(crate) fn recv(fd: RawFd, buf: &mut [u8]) -> io::Result<ReadOutcome> {
    // SAFETY: `buf` is valid writable memory of the given length.
    let ret = unsafe {
        libc::recv(
            fd,
            buf.as_mut_ptr().cast(),
            buf.len(),
            libc::MSG_DONTWAIT,
        )
    };
    if ret > 0 {
        #[allow(clippy::cast_sign_loss)]
        let n = ret as usize;
        Ok(ReadOutcome::Data(n))
    } else if ret == 0 {
        Ok(ReadOutcome::Closed)
    } else {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock {
            Ok(ReadOutcome::WouldBlock)
        } else {
            Err(err)
        }
    }
}

/// Non-blocking write of `buf`, suppressing `SIGPIPE`.
pub(crate) fn send(fd: RawFd, buf: &[u8]) -> io::Result<WriteOutcome> {
    // SAFETY: `buf` is valid readable memory of the given length.
    let ret = unsafe {
        libc::send(
            fd,
            buf.as_ptr().cast(),
            buf.len(),
            libc::MSG_DONTWAIT | libc::MSG_NOSIGNAL,
        )
    };
    if ret >= 0 {
        #[allow(clippy::cast_sign_loss)]
        let n = ret as usize;
        Ok(WriteOutcome::Wrote(n))
    } else {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock {
            Ok(WriteOutcome::WouldBlock)
        } else {
            Err(err)
        }
    }
}

/// Closes a descriptor, ignoring errors (the fd is gone either way).
pub(crate) fn close(fd: RawFd) {
    // SAFETY: close(2) on an owned fd; double-close is excluded by the
    // single-ownership discipline of the reactor and pump.
    unsafe {
        libc::close(fd);
    }
}

/// Maximum events drained per `epoll_wait` call.
const MAX_EVENTS: usize = 64;

/// A private epoll instance owned by one reactor worker.
pub(crate) struct Epoll {
    fd: RawFd,
    events: Vec<libc::epoll_event>,
}

impl Epoll {
    /// Creates a new epoll instance.
    pub(crate) fn new() -> io::Result<Self> {
        // SAFETY: epoll_create1(2) with CLOEXEC; the fd is owned by Self.
        let fd = cvt(unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) })?;
        Ok(Self {
            fd,
            events: vec![libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS],
        })
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, events: u32) -> io::Result<()> {
        let mut ev = libc::epoll_event {
            events,
            u64: fd as u64,
        };
        // SAFETY: `ev` is valid for the duration of the call; a null event
        // pointer is permitted for EPOLL_CTL_DEL.
        let ev_ptr = if op == libc::EPOLL_CTL_DEL {
            std::ptr::null_mut()
        } else {
            std::ptr::addr_of_mut!(ev)
        };
        cvt(unsafe { libc::epoll_ctl(self.fd, op, fd, ev_ptr) }).map(|_| ())
    }

    /// Registers a descriptor for level-triggered readable events.
    pub(crate) fn add_level(&self, fd: RawFd) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_ADD, fd, libc::EPOLLIN as u32)
    }

    /// Registers a descriptor for edge-triggered readable events.
    pub(crate) fn add_edge(&self, fd: RawFd) -> io::Result<()> {
        self.ctl(
            libc::EPOLL_CTL_ADD,
            fd,
            libc::EPOLLIN as u32 | libc::EPOLLET as u32,
        )
    }

    /// Deregisters a descriptor. Must precede every close.
    pub(crate) fn remove(&self, fd: RawFd) {
        // A fd torn down by the peer may already be gone; nothing to do.
        let _ = self.ctl(libc::EPOLL_CTL_DEL, fd, 0);
    }

    /// Waits up to `timeout_ms` and returns the ready descriptors.
    pub(crate) fn wait(&mut self, timeout_ms: i32) -> io::Result<Vec<RawFd>> {
        // SAFETY: the events buffer is valid for MAX_EVENTS entries.
        let ret = unsafe {
            libc::epoll_wait(
                self.fd,
                self.events.as_mut_ptr(),
                MAX_EVENTS as libc::c_int,
                timeout_ms,
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(Vec::new());
            }
            return Err(err);
        }
        #[allow(clippy::cast_sign_loss)]
        let n = ret as usize;
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let ready = self.events[..n].iter().map(|ev| ev.u64 as RawFd).collect();
        Ok(ready)
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        close(self.fd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_lifecycle() {
        let fd = listener(0, 16).expect("listener on ephemeral port");
        assert!(fd >= 0);
        assert_eq!(accept(fd).expect("accept on idle listener"), None);
        close(fd);
    }

    #[test]
    fn test_two_listeners_share_port() {
        // SO_REUSEPORT allows the second bind on the same fixed port.
        let a = listener(18911, 16).expect("first listener");
        let b = listener(18911, 16).expect("second listener");
        close(a);
        close(b);
    }

    #[test]
    fn test_epoll_times_out_empty() {
        let mut ep = Epoll::new().expect("epoll");
        let ready = ep.wait(0).expect("wait");
        assert!(ready.is_empty());
    }
}

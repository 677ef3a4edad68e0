//! Wire-level integration tests: real sockets against an in-process
//! server, covering the raw, HTTP, and WebSocket surfaces.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use cratefall_server::{Server, ServerConfig};

fn start_server(port: u16, configure: impl FnOnce(&mut Server)) -> Server {
    let mut server = Server::new(ServerConfig {
        port,
        workers: 2,
        backlog: 64,
    });
    configure(&mut server);
    server.start().expect("server start");
    server
}

fn connect(port: u16) -> TcpStream {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        match TcpStream::connect(("127.0.0.1", port)) {
            Ok(stream) => {
                stream
                    .set_read_timeout(Some(Duration::from_secs(2)))
                    .expect("read timeout");
                return stream;
            }
            Err(err) => {
                assert!(Instant::now() < deadline, "connect failed: {err}");
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

fn read_until_eof(stream: &mut TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    let _ = stream.read_to_end(&mut out);
    out
}

/// Issues one HTTP request and splits the closed-connection response into
/// (status line, headers, body).
fn http_roundtrip(port: u16, request: &str) -> (String, Vec<String>, Vec<u8>) {
    let mut stream = connect(port);
    stream.write_all(request.as_bytes()).expect("send request");
    let raw = read_until_eof(&mut stream);

    let sep = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("header terminator");
    let head = String::from_utf8(raw[..sep].to_vec()).expect("utf8 head");
    let body = raw[sep + 4..].to_vec();

    let mut lines = head.split("\r\n").map(str::to_string);
    let status = lines.next().expect("status line");
    (status, lines.collect(), body)
}

fn header<'a>(headers: &'a [String], name: &str) -> Option<&'a str> {
    headers.iter().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

#[test]
fn http_command_returns_packed_record() {
    let record: [u8; 24] = *b"\x28\x22\x35\x01\x16\x00\x00\x00Chilly\0\0\0\0\0\0\0\0\0\0";
    let server = start_server(18801, |server| {
        server
            .register_command(b'1', "GetWeatherForecast", 24, "", "u32|i32|c16", move |_, _| {
                record.to_vec()
            })
            .unwrap();
    });

    let (status, headers, body) = http_roundtrip(18801, "GET /1 HTTP/1.1\r\n\r\n");
    assert_eq!(status, "HTTP/1.1 200 OK");
    assert_eq!(
        header(&headers, "Content-Type"),
        Some("application/octet-stream")
    );
    assert_eq!(header(&headers, "Content-Length"), Some("24"));
    assert_eq!(header(&headers, "Access-Control-Allow-Origin"), Some("*"));
    assert_eq!(header(&headers, "Connection"), Some("close"));
    assert_eq!(body, record);
    drop(server);
}

#[test]
fn raw_command_returns_bare_bytes() {
    let server = start_server(18802, |server| {
        server
            .register_command(b'2', "GetSystemStatus", 2, "", "c2:status", |_, _| {
                b"OK".to_vec()
            })
            .unwrap();
    });

    let mut stream = connect(18802);
    stream.write_all(&[0x32]).expect("send command byte");
    let reply = read_until_eof(&mut stream);
    assert_eq!(reply, b"OK");
    drop(server);
}

#[test]
fn introspection_returns_contract_array() {
    let server = start_server(18803, |server| {
        server
            .register_command(b'1', "One", 4, "", "u32", |_, _| vec![0; 4])
            .unwrap();
        server
            .register_command(b'2', "Two", 2, "", "c2", |_, _| b"OK".to_vec())
            .unwrap();
        server
            .register_stream(b'3', "Three", 8, "u32|f32", Vec::new)
            .unwrap();
    });

    let (status, _, body) = http_roundtrip(18803, "GET /? HTTP/1.1\r\n\r\n");
    assert_eq!(status, "HTTP/1.1 200 OK");
    assert_eq!(body.len(), 3 * 128);
    assert_eq!(body[0], b'1');
    assert_eq!(body[128], b'2');
    assert_eq!(body[256], b'3');
    // kind field of the stream contract: little-endian 1 at offset 36.
    assert_eq!(&body[256 + 36..256 + 40], &1u32.to_le_bytes());

    // The same image is served over the raw surface.
    let mut stream = connect(18803);
    stream.write_all(b"?").expect("send introspect");
    let raw = read_until_eof(&mut stream);
    assert_eq!(raw, body);
    drop(server);
}

#[test]
fn health_probe_on_root_path() {
    let server = start_server(18804, |_| {});
    let (status, headers, body) = http_roundtrip(18804, "GET / HTTP/1.1\r\n\r\n");
    assert_eq!(status, "HTTP/1.1 200 OK");
    assert_eq!(header(&headers, "Content-Type"), Some("application/json"));
    assert_eq!(body, br#"{"status":"ok"}"#);
    drop(server);
}

#[test]
fn options_preflight_gets_cors_headers() {
    let server = start_server(18805, |_| {});
    let mut stream = connect(18805);
    stream
        .write_all(b"OPTIONS /1 HTTP/1.1\r\n\r\n")
        .expect("send preflight");
    let raw = read_until_eof(&mut stream);
    let text = String::from_utf8(raw).unwrap();
    assert!(text.starts_with("HTTP/1.1 204 No Content\r\n"));
    assert!(text.contains("Access-Control-Allow-Methods: POST, GET, OPTIONS\r\n"));
    assert!(text.contains("Access-Control-Allow-Headers: Content-Type\r\n"));
    drop(server);
}

#[test]
fn unknown_ids_get_404_or_silent_close() {
    let server = start_server(18806, |_| {});

    let (status, _, body) = http_roundtrip(18806, "GET /z HTTP/1.1\r\n\r\n");
    assert_eq!(status, "HTTP/1.1 404 Not Found");
    assert!(body.is_empty());

    let mut stream = connect(18806);
    stream.write_all(&[0x7A]).expect("send unknown command");
    assert_eq!(read_until_eof(&mut stream), b"");
    drop(server);
}

#[test]
fn post_body_honors_content_length() {
    let server = start_server(18807, |server| {
        server
            .register_command(b'8', "Echo", 0, "bytes", "bytes", |_, body| body.to_vec())
            .unwrap();
    });

    let payload = b"twelve bytes";
    let request = format!(
        "POST /8 HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
        payload.len(),
        String::from_utf8_lossy(payload)
    );
    let (status, headers, body) = http_roundtrip(18807, &request);
    assert_eq!(status, "HTTP/1.1 200 OK");
    assert_eq!(header(&headers, "Content-Length"), Some("12"));
    assert_eq!(body, payload);
    drop(server);
}

#[test]
fn panicking_handler_closes_only_its_connection() {
    let server = start_server(18808, |server| {
        server
            .register_command(b'X', "Faulty", 0, "", "", |_, _| panic!("handler bug"))
            .unwrap();
        server
            .register_command(b'2', "GetSystemStatus", 2, "", "c2:status", |_, _| {
                b"OK".to_vec()
            })
            .unwrap();
    });

    let mut stream = connect(18808);
    stream.write_all(b"GET /X HTTP/1.1\r\n\r\n").expect("send");
    assert_eq!(read_until_eof(&mut stream), b"");

    // The process and the other endpoints are unaffected.
    let (status, _, body) = http_roundtrip(18808, "GET /2 HTTP/1.1\r\n\r\n");
    assert_eq!(status, "HTTP/1.1 200 OK");
    assert_eq!(body, b"OK");
    drop(server);
}

const UPGRADE_TEMPLATE: &str = "GET /{id} HTTP/1.1\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n";

fn upgrade_request(id: char) -> String {
    UPGRADE_TEMPLATE.replace("{id}", &id.to_string())
}

/// Reads the 101 reply off the front of the stream.
fn read_handshake(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).expect("handshake byte");
        assert!(n > 0, "connection closed inside handshake");
        buf.push(byte[0]);
    }
    String::from_utf8(buf).expect("utf8 handshake")
}

#[test]
fn websocket_subscriber_receives_frames() {
    let server = start_server(18809, |server| {
        server
            .register_stream(b'W', "WorldStream", 64, "bytes", || vec![0x5A; 64])
            .unwrap();
    });

    let mut stream = connect(18809);
    stream
        .write_all(upgrade_request('W').as_bytes())
        .expect("send upgrade");

    let handshake = read_handshake(&mut stream);
    assert!(handshake.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    assert!(handshake.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));

    // 64-byte payload: 2-byte header [0x82, 64] then the payload.
    let mut frames = 0;
    let mut frame = [0u8; 66];
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        match stream.read_exact(&mut frame) {
            Ok(()) => {
                assert_eq!(frame[0], 0x82);
                assert_eq!(frame[1], 64);
                assert!(frame[2..].iter().all(|&b| b == 0x5A));
                frames += 1;
            }
            Err(_) => break,
        }
    }
    // 60 Hz for 2 s under no load; generous slack for scheduler jitter.
    assert!(frames >= 100, "only {frames} frames in 2s");
    drop(server);
}

#[test]
fn upgrade_on_unregistered_id_closes_after_handshake() {
    let server = start_server(18810, |_| {});
    let mut stream = connect(18810);
    stream
        .write_all(upgrade_request('Z').as_bytes())
        .expect("send upgrade");

    let raw = read_until_eof(&mut stream);
    let text = String::from_utf8_lossy(&raw);
    assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    assert!(text.ends_with("\r\n\r\n"), "no frames after the handshake");
    drop(server);
}

#[test]
fn non_reading_subscriber_is_evicted() {
    // Large frames fill the kernel buffers of a silent subscriber within
    // a few ticks, forcing the short write that triggers eviction.
    let server = start_server(18811, |server| {
        server
            .register_stream(b'W', "WorldStream", 0, "bytes", || vec![0x33; 32 * 1024])
            .unwrap();
    });

    let mut reader = connect(18811);
    reader
        .write_all(upgrade_request('W').as_bytes())
        .expect("reader upgrade");
    read_handshake(&mut reader);

    let mut silent = connect(18811);
    silent
        .write_all(upgrade_request('W').as_bytes())
        .expect("silent upgrade");

    // Wait for both subscriptions to attach, then for the silent one to
    // be evicted. The reader keeps draining its socket throughout.
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut scratch = vec![0u8; 64 * 1024];
    let mut reader_bytes = 0usize;
    let mut saw_both = false;
    loop {
        if let Ok(n) = reader.read(&mut scratch) {
            reader_bytes += n;
        }
        let count = server.subscriber_count(b'W');
        saw_both |= count == 2;
        if saw_both && count == 1 {
            break;
        }
        assert!(
            Instant::now() < deadline,
            "silent subscriber never evicted (count={count})"
        );
    }

    assert!(reader_bytes > 0, "surviving subscriber stopped receiving");
    drop(server);
}

#[test]
fn shutdown_unblocks_join() {
    let mut server = start_server(18812, |_| {});
    server.shutdown();
    let begin = Instant::now();
    server.join();
    assert!(Instant::now() - begin < Duration::from_secs(2));
}

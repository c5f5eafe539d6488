//! Download manager behaviour against a minimal local HTTP server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use acquisition::{
    download_all, find_local_files, AcquisitionError, DownloadConfig, DownloadManager, Scenario,
    ScenarioFile,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const BODY_LEN: usize = 5000;

fn body() -> Vec<u8> {
    (0..BODY_LEN).map(|i| (i % 251) as u8).collect()
}

#[derive(Default)]
struct ServerLog {
    ranges: Mutex<Vec<String>>,
    flaky_gets: AtomicUsize,
}

async fn respond(stream: &mut TcpStream, status: &str, headers: &[(&str, String)], body: &[u8]) {
    let mut head = format!("HTTP/1.1 {}\r\nConnection: close\r\n", status);
    for (name, value) in headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(body).await;
    let _ = stream.shutdown().await;
}

async fn handle(mut stream: TcpStream, log: Arc<ServerLog>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let request = String::from_utf8_lossy(&buf).to_string();
    let mut lines = request.lines();
    let first = lines.next().unwrap_or_default();
    let mut parts = first.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    let range = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.eq_ignore_ascii_case("range"))
        .map(|(_, v)| v.trim().to_string());

    let full = body();
    let is_head = method == "HEAD";
    match path.as_str() {
        "/missing" => respond(&mut stream, "404 Not Found", &[("Content-Length", "0".into())], &[]).await,
        "/short" => {
            // advertises the full size but only ever sends half
            let len = if is_head { BODY_LEN } else { BODY_LEN / 2 };
            let payload = if is_head { &[][..] } else { &full[..BODY_LEN / 2] };
            respond(&mut stream, "200 OK", &[("Content-Length", len.to_string())], payload).await
        }
        "/flaky" if !is_head && log.flaky_gets.fetch_add(1, Ordering::SeqCst) == 0 => {
            respond(&mut stream, "503 Service Unavailable", &[("Content-Length", "0".into())], &[]).await
        }
        _ => {
            let headers_full = [
                ("Content-Length", BODY_LEN.to_string()),
                ("Accept-Ranges", "bytes".to_string()),
            ];
            if is_head {
                return respond(&mut stream, "200 OK", &headers_full, &[]).await;
            }
            match range.as_deref().and_then(|r| r.strip_prefix("bytes=")) {
                Some(spec) => {
                    log.ranges.lock().unwrap().push(spec.to_string());
                    let start: usize = spec.trim_end_matches('-').parse().unwrap_or(0);
                    let headers = [
                        ("Content-Length", (BODY_LEN - start).to_string()),
                        ("Content-Range", format!("bytes {}-{}/{}", start, BODY_LEN - 1, BODY_LEN)),
                    ];
                    respond(&mut stream, "206 Partial Content", &headers, &full[start..]).await
                }
                None => respond(&mut stream, "200 OK", &headers_full, &full).await,
            }
        }
    }
}

async fn serve() -> (SocketAddr, Arc<ServerLog>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(ServerLog::default());
    let server_log = log.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(handle(stream, server_log.clone()));
        }
    });
    (addr, log)
}

fn config(dir: &std::path::Path) -> DownloadConfig {
    DownloadConfig {
        max_retries: 2,
        initial_retry_delay: Duration::from_millis(5),
        max_retry_delay: Duration::from_millis(20),
        request_timeout: Duration::from_secs(10),
        ..DownloadConfig::in_dir(dir)
    }
}

#[tokio::test]
async fn test_download_and_verify() {
    let (addr, _) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let manager = DownloadManager::new(config(dir.path())).unwrap();

    let path = manager
        .download(&format!("http://{}/file.bin", addr), "file.bin", None)
        .await
        .unwrap();
    assert_eq!(path, dir.path().join("file.bin"));
    assert_eq!(std::fs::read(&path).unwrap(), body());
    assert!(!dir.path().join(".partial/file.bin.partial").exists());
}

#[tokio::test]
async fn test_resume_from_partial() {
    let (addr, log) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    std::fs::create_dir_all(&config.temp_dir).unwrap();
    std::fs::write(config.temp_dir.join("file.bin.partial"), &body()[..1200]).unwrap();

    let manager = DownloadManager::new(config).unwrap();
    let path = manager
        .download(&format!("http://{}/file.bin", addr), "file.bin", Some(BODY_LEN as u64))
        .await
        .unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), body());
    assert_eq!(log.ranges.lock().unwrap().clone(), vec!["1200-".to_string()]);
}

#[tokio::test]
async fn test_existing_file_with_matching_size_is_kept() {
    let (addr, log) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("file.bin"), vec![7u8; BODY_LEN]).unwrap();

    let manager = DownloadManager::new(config(dir.path())).unwrap();
    let path = manager
        .download(&format!("http://{}/file.bin", addr), "file.bin", Some(BODY_LEN as u64))
        .await
        .unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), vec![7u8; BODY_LEN]);
    assert!(log.ranges.lock().unwrap().is_empty());

    // wrong size is fetched again
    std::fs::write(dir.path().join("file.bin"), vec![7u8; 10]).unwrap();
    let path = manager
        .download(&format!("http://{}/file.bin", addr), "file.bin", Some(BODY_LEN as u64))
        .await
        .unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), body());
}

#[tokio::test]
async fn test_retry_after_server_error() {
    let (addr, log) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let manager = DownloadManager::new(config(dir.path())).unwrap();

    let path = manager
        .download(&format!("http://{}/flaky", addr), "flaky.bin", None)
        .await
        .unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), body());
    assert_eq!(log.flaky_gets.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let (addr, _) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let manager = DownloadManager::new(config(dir.path())).unwrap();

    let err = manager
        .download(&format!("http://{}/missing", addr), "missing.bin", None)
        .await
        .unwrap_err();
    match err {
        AcquisitionError::RetriesExhausted { attempts, last, .. } => {
            assert_eq!(attempts, 1);
            assert!(matches!(*last, AcquisitionError::Status { status: 404, .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_truncated_body_fails_size_check() {
    let (addr, _) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let manager = DownloadManager::new(config(dir.path())).unwrap();

    let err = manager
        .download(&format!("http://{}/short", addr), "short.bin", None)
        .await
        .unwrap_err();
    match err {
        AcquisitionError::RetriesExhausted { attempts, last, .. } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, AcquisitionError::SizeMismatch { expected, actual, .. }
                if expected == BODY_LEN as u64 && actual == (BODY_LEN / 2) as u64));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(!dir.path().join("short.bin").exists());
}

#[tokio::test]
async fn test_download_all_keeps_listing_order() {
    let (addr, _) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let manager = DownloadManager::new(config(dir.path())).unwrap();

    let file = |key: &str, name: &str| ScenarioFile {
        key: key.to_string(),
        filename: name.to_string(),
        channel: name.to_string(),
        size: None,
    };
    let files = vec![file("b", "b.bin"), file("a", "a.bin")];
    for f in &files {
        manager
            .download(&format!("http://{}/{}", addr, f.key), &f.filename, f.size)
            .await
            .unwrap();
    }

    // both present already, so nothing goes to the bucket
    let paths = download_all(&manager, Scenario::UsMidlatitudeCyclone, files)
        .await
        .unwrap();
    assert_eq!(paths, vec![dir.path().join("b.bin"), dir.path().join("a.bin")]);
}

#[test]
fn test_find_local_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let nested = root.join("2019/073");
    std::fs::create_dir_all(&nested).unwrap();
    for band in 1..=16u8 {
        let name = format!(
            "OR_ABI-L1b-RadC-M3C{:02}_G16_s20190730002186_e20190730004559_c20190730005006.nc",
            band
        );
        let target = if band % 2 == 0 { &nested } else { &root };
        std::fs::write(target.join(name), b"x").unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

    let files = find_local_files(Scenario::UsMidlatitudeCyclone, dir.path()).unwrap();
    assert_eq!(files.len(), 16);
    assert!(files[0].to_string_lossy().contains("M3C01_"));
    assert!(files[15].to_string_lossy().contains("M3C16_"));

    std::fs::remove_file(&files[4]).unwrap();
    assert!(matches!(
        find_local_files(Scenario::UsMidlatitudeCyclone, dir.path()),
        Err(AcquisitionError::IncompleteListing { found: 15, .. })
    ));
}

/// Lists the real bucket; needs network access.
#[tokio::test]
#[ignore]
async fn test_cyclone_listing_has_sixteen_channels() {
    let lister = acquisition::S3Lister::anonymous().await;
    let scenario = Scenario::UsMidlatitudeCyclone;
    let listing = lister.list(scenario.bucket(), scenario.prefix()).await.unwrap();
    let files = acquisition::select_scenario_files(&listing, scenario).unwrap();
    assert_eq!(files.len(), 16);
    assert!(files.iter().all(|f| f.size.unwrap_or(0) > 0));
}

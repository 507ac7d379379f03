use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    /// Answer HEAD with 405 so clients must fall back to GET.
    pub reject_head: bool,
}

impl Route {
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.into(),
            reject_head: false,
        }
    }

    #[allow(dead_code)]
    pub fn markdown(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/markdown; charset=utf-8",
            body: body.into(),
            reject_head: false,
        }
    }

    #[allow(dead_code)]
    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = content_type;
        self
    }

    #[allow(dead_code)]
    pub fn without_head(mut self) -> Self {
        self.reject_head = true;
        self
    }

    #[allow(dead_code)]
    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: format!("status {status}"),
            reject_head: false,
        }
    }
}

/// One HTML page with a nav of links and a `<main>` long enough to be
/// picked by the extractor.
pub fn doc_page(title: &str, links: &[&str]) -> String {
    let nav = links
        .iter()
        .map(|href| format!(r#"<a href="{href}">{href}</a>"#))
        .collect::<Vec<_>>()
        .join("\n");
    let body = format!("{title} explains one part of the product in detail. ").repeat(6);
    format!(
        r#"<!doctype html>
<html>
  <head><title>{title}</title></head>
  <body>
    <nav>{nav}</nav>
    <main>
      <h1>{title}</h1>
      <p>{body}</p>
    </main>
    <footer>Footer text</footer>
  </body>
</html>
"#
    )
}

struct Logged {
    method: String,
    path: String,
    range: Option<String>,
}

pub struct DocsServer {
    pub base_url: String,
    pub port: u16,
    requests: Arc<Mutex<Vec<Logged>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl DocsServer {
    /// `{{PORT}}` in a body is replaced with the server's port.
    pub fn spawn(routes: Vec<(&'static str, Route)>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start docs server");
        let addr = server.server_addr();
        let port = addr.to_ip().map(|ip| ip.port()).expect("tcp listen address");
        let base_url = format!("http://127.0.0.1:{port}");

        let routes: HashMap<&'static str, Route> = routes.into_iter().collect();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(20)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = request.url().to_string();
                let path = url.split('?').next().unwrap_or(&url).to_owned();
                let method = request.method().to_string();
                let range = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Range"))
                    .map(|h| h.value.as_str().to_owned());
                log.lock().expect("request log lock").push(Logged {
                    method: method.clone(),
                    path: path.clone(),
                    range,
                });

                let route = match routes.get(path.as_str()) {
                    Some(route) if route.reject_head && method == "HEAD" => Route::status(405),
                    Some(route) => route.clone(),
                    None => Route::status(404),
                };
                let header = tiny_http::Header::from_bytes(
                    &b"Content-Type"[..],
                    route.content_type.as_bytes(),
                )
                .expect("build header");
                let body = route.body.replace("{{PORT}}", &port.to_string());
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(route.status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            port,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Number of requests with this method and path.
    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests
            .lock()
            .expect("request log lock")
            .iter()
            .filter(|logged| logged.method == method && logged.path == path)
            .count()
    }

    /// `Range` headers sent with this method and path, in request order.
    #[allow(dead_code)]
    pub fn ranges(&self, method: &str, path: &str) -> Vec<Option<String>> {
        self.requests
            .lock()
            .expect("request log lock")
            .iter()
            .filter(|logged| logged.method == method && logged.path == path)
            .map(|logged| logged.range.clone())
            .collect()
    }
}

impl Drop for DocsServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

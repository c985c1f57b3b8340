use std::sync::Arc;
use std::time::Duration;

use cookie::Cookie;
use http::header::{COOKIE, SET_COOKIE};
use http::{Request, Response, StatusCode};
use satchel::DEFAULT_COOKIE_NAME;
use satchel::prelude::*;
use serde::{Deserialize, Serialize};
use tower::{BoxError, Service, ServiceBuilder, ServiceExt};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct Profile {
    name: String,
}

type Store = FileStore;

async fn app(req: Request<String>) -> Result<Response<String>, BoxError> {
    let handle = req.session::<Store>().ok_or("session layer not installed")?;
    let mut session = handle.lock().await;

    let body = match req.uri().path() {
        "/login" => {
            let profile = Profile {
                name: req.body().clone(),
            };
            session.insert("profile", &profile)?;
            // New privileges, new identifier.
            session.regenerate_id()?;
            format!("welcome, {}", profile.name)
        }
        "/logout" => {
            session.destroy().await?;
            "bye".to_string()
        }
        "/" => {
            let visits = session.get_as::<u64>("visits")?.unwrap_or(0) + 1;
            session.set("visits", visits)?;
            match session.get_as::<Profile>("profile")? {
                Some(p) => format!("{} has visited {visits} time(s)", p.name),
                None => format!("anonymous visit #{visits}"),
            }
        }
        _ => {
            let mut res = Response::new("not found".to_string());
            *res.status_mut() = StatusCode::NOT_FOUND;
            return Ok(res);
        }
    };
    Ok(Response::new(body))
}

// ---------------------------------------------------------------------------
// Simulated browser
// ---------------------------------------------------------------------------

/// Remembers one session cookie between requests, like a browser would.
#[derive(Default)]
struct Browser {
    session: Option<Cookie<'static>>,
}

impl Browser {
    async fn visit<Svc>(&mut self, svc: &Svc, path: &str, body: &str) -> Result<String, BoxError>
    where
        Svc: Service<Request<String>, Response = Response<String>, Error = BoxError> + Clone,
    {
        let mut builder = Request::builder().uri(path);
        if let Some(c) = &self.session {
            builder = builder.header(COOKIE, format!("{}={}", c.name(), c.value()));
        }
        let res = svc.clone().oneshot(builder.body(body.to_string())?).await?;

        for value in res.headers().get_all(SET_COOKIE) {
            let cookie = Cookie::parse(value.to_str()?.to_string())?;
            if cookie.name() != DEFAULT_COOKIE_NAME {
                continue;
            }
            self.session = if cookie.value().is_empty() {
                None
            } else {
                Some(cookie)
            };
        }
        Ok(res.into_body())
    }

    fn cookie_prefix(&self) -> String {
        self.session
            .as_ref()
            .map(|c| SessionId::from(c.value()).short().to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,satchel=debug,satchel_session=debug")
        }))
        .init();

    let dir = std::env::temp_dir().join(format!("visit-counter-{}", std::process::id()));
    let store = Arc::new(
        FileStore::open(&dir)
            .await?
            .with_ttl(Duration::from_secs(900)),
    );
    let sweeper = spawn_sweeper(Arc::clone(&store), SweepConfig::default());

    let svc = ServiceBuilder::new()
        .layer(SessionLayer::new(Arc::clone(&store)))
        .service_fn(app);

    let mut browser = Browser::default();
    let script = [
        ("/", ""),
        ("/", ""),
        ("/login", "ana"),
        ("/", ""),
        ("/logout", ""),
        ("/", ""),
    ];
    for (path, body) in script {
        let reply = browser.visit(&svc, path, body).await?;
        eprintln!("{path:<8} -> {reply:<32} cookie={}", browser.cookie_prefix());
    }

    let metrics = sweeper.stop().await;
    tracing::info!(runs = metrics.runs, purged = metrics.purged, "sweeper stopped");
    tokio::fs::remove_dir_all(&dir).await?;
    Ok(())
}

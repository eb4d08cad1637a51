//! `bar ui` — a minimal, read-only status server for observing a task
//! from outside the terminal.
//!
//! Deliberately thin: one endpoint, no templating engine, no websocket
//! push. `tiny_http` is synchronous, matching the rest of this crate's
//! single-threaded-per-request model, rather than pulling in an async
//! runtime for a server this small.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tiny_http::{Response, Server};

use crate::ledger::Ledger;
use crate::styling::{info_message, println};
use crate::task::Task;

use super::Context;

/// A running background UI server; dropping without calling
/// [`Self::shutdown`] leaves the listener thread running until the
/// process exits.
pub struct UiHandle {
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl UiHandle {
    /// Signal the server to stop and wait up to 5 seconds for it to do so.
    pub fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.join.join();
    }
}

fn status_json(ctx: &Context, task: &Task) -> String {
    let ledger = Ledger::at(&ctx.tasks.task_dir(&task.id));
    let step_count = ledger.list().map(|s| s.len()).unwrap_or(0);
    serde_json::json!({
        "task_id": task.id,
        "name": task.name,
        "branch": task.branch,
        "base_ref": task.base_ref,
        "status": task.status,
        "step_count": step_count,
    })
    .to_string()
}

/// Start the server in the background for the duration of a `wrap`
/// session. Binds to `port` (0 picks an ephemeral port).
pub fn spawn_background(ctx: &Context, task: &Task, port: u16) -> anyhow::Result<UiHandle> {
    let server = Server::http(("127.0.0.1", port))
        .map_err(|e| crate::error::BarError::command_failed(format!("failed to bind ui server: {e}")))?;
    let bound_port = server.server_addr().to_ip().map(|a| a.port()).unwrap_or(port);
    println!("{}", info_message(format!("ui listening on http://127.0.0.1:{bound_port}")));

    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = stop.clone();
    let body = status_json(ctx, task);

    let join = std::thread::spawn(move || {
        serve_loop(server, stop_clone, move || body.clone());
    });

    Ok(UiHandle { stop, join })
}

/// `bar ui` as a standalone, foreground command: blocks until the user
/// interrupts it (Ctrl+C) or five seconds after the process receives a
/// shutdown signal via [`UiHandle::shutdown`]'s stop flag semantics —
/// here there is no wrapped child, so the server simply runs until the
/// process is killed.
pub fn handle_ui(ctx: &Context, port: u16, no_open: bool) -> anyhow::Result<()> {
    let task = ctx.tasks.get_active()?.ok_or_else(crate::error::BarError::no_active_task)?;

    let server = Server::http(("127.0.0.1", port))
        .map_err(|e| crate::error::BarError::command_failed(format!("failed to bind ui server: {e}")))?;
    let bound_port = server.server_addr().to_ip().map(|a| a.port()).unwrap_or(port);
    println!("{}", info_message(format!("ui listening on http://127.0.0.1:{bound_port}")));
    if !no_open {
        println!("{}", info_message(format!("open http://127.0.0.1:{bound_port}/status in a browser")));
    }

    let stop = Arc::new(AtomicBool::new(false));
    serve_loop(server, stop, || status_json(ctx, &task));
    Ok(())
}

fn serve_loop(server: Server, stop: Arc<AtomicBool>, body_fn: impl Fn() -> String) {
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        match server.recv_timeout(Duration::from_millis(200)) {
            Ok(Some(request)) => {
                let body = body_fn();
                let response = Response::from_string(body)
                    .with_header(tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap());
                let _ = request.respond(response);
            }
            Ok(None) => continue,
            Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_repo::TestRepo;
    use crate::task::TaskStatus;

    fn sample_task() -> Task {
        let now = crate::utils::now();
        Task {
            id: "abc12345".into(),
            name: "demo".into(),
            repo_root: "/repo".into(),
            base_ref: "main".into(),
            branch: "bar/demo-abc12345".into(),
            workspace_path: "/ws".into(),
            status: TaskStatus::Active,
            created_at: now,
            updated_at: now,
            closed_at: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn status_json_contains_task_fields() {
        let fixture = TestRepo::new();
        let bar_dir = fixture.dir.path().join(".bar");
        std::fs::create_dir_all(bar_dir.join("tasks")).unwrap();
        let ctx = Context {
            repo_root: fixture.dir.path().to_path_buf(),
            bar_dir: bar_dir.clone(),
            config: crate::config::Config::default(),
            tasks: crate::task::TaskManager::new(bar_dir),
        };
        let task = sample_task();
        let json = status_json(&ctx, &task);
        assert!(json.contains("abc12345"));
        assert!(json.contains("\"step_count\":0"));
    }

    #[test]
    fn spawn_background_binds_ephemeral_port_and_shuts_down() {
        let fixture = TestRepo::new();
        let bar_dir = fixture.dir.path().join(".bar");
        std::fs::create_dir_all(bar_dir.join("tasks")).unwrap();
        let ctx = Context {
            repo_root: fixture.dir.path().to_path_buf(),
            bar_dir: bar_dir.clone(),
            config: crate::config::Config::default(),
            tasks: crate::task::TaskManager::new(bar_dir),
        };
        let task = sample_task();
        let handle = spawn_background(&ctx, &task, 0).unwrap();
        handle.shutdown();
    }
}

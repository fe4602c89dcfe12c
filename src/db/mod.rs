//! Local SQLite cache of finished results. It only exists so the report
//! views have something truthful to fall back on when the backend is down
//! or still writing.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod helpers;
mod migrations;
mod results;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const IN_MEMORY: &str = ":memory:";

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// The connection lives on this thread. Dropping the queue sender ends the
/// worker loop; the thread is joined afterwards.
struct Worker {
    jobs: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Result cache thread panicked");
            }
        }
    }
}

/// Handle to the cache thread. Cheap to clone; the thread exits when the
/// last clone is dropped.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    location: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create cache directory {}", parent.display())
            })?;
        }
        Self::spawn(db_path)
    }

    /// Private cache that disappears with the last handle.
    pub fn in_memory() -> Result<Self> {
        Self::spawn(PathBuf::from(IN_MEMORY))
    }

    fn spawn(location: PathBuf) -> Result<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let path = location.clone();

        let thread = thread::Builder::new()
            .name("gazeboard-cache".into())
            .spawn(move || {
                let mut conn = match open_connection(&path) {
                    Ok(conn) => {
                        let _ = ready_tx.send(Ok(()));
                        conn
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                for job in jobs_rx {
                    job(&mut conn);
                }
                debug!("Result cache thread exiting");
            })
            .context("failed to spawn result cache thread")?;

        ready_rx
            .recv()
            .context("result cache thread exited during startup")??;
        info!("Result cache ready at {}", location.display());

        Ok(Self {
            worker: Arc::new(Worker {
                jobs: Some(jobs_tx),
                thread: Some(thread),
            }),
            location: Arc::new(location),
        })
    }

    pub fn path(&self) -> &Path {
        self.location.as_path()
    }

    /// Run `task` on the cache thread and wait for its answer.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let jobs = self
            .worker
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("result cache is closed"))?;
        let (reply_tx, reply_rx) = oneshot::channel();

        jobs.send(Box::new(move |conn: &mut Connection| {
            // The caller may have stopped waiting; nothing to do then.
            let _ = reply_tx.send(task(conn));
        }))
        .map_err(|_| anyhow!("result cache thread is gone"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("result cache thread dropped the request"))?
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open result cache {}", path.display()))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set cache busy timeout")?;

    match conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
        row.get::<_, String>(0)
    }) {
        Ok(mode) => debug!("Result cache journal mode: {mode}"),
        Err(err) => error!("Failed to enable WAL mode: {err}"),
    }

    migrations::run_migrations(&mut conn).context("failed to migrate result cache")?;
    Ok(conn)
}

use tokio_cron_scheduler::{Job, JobScheduler};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info};

use crate::core::events::Event;
use crate::core::service::RecentBuilds;
use crate::error::{OverlayError, OverlayResult};

pub struct Scheduler {
    scheduler: JobScheduler,
    service: RecentBuilds,
    sender: Arc<Sender<Event>>, // communication to the display loop
}

pub enum JobProcess<'schedule> {
    InitialRefresh,
    RefreshBuilds(&'schedule str),
}

impl Scheduler {
    pub async fn new(service: RecentBuilds, sender: Arc<Sender<Event>>) -> OverlayResult<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Scheduler {
            scheduler,
            service,
            sender,
        })
    }

    pub async fn add_job(&self, job_process: JobProcess<'_>) -> OverlayResult<uuid::Uuid> {
        let job = match job_process {
            JobProcess::InitialRefresh => {
                initial_refresh_job(self.service.clone(), self.sender.clone())?
            }
            JobProcess::RefreshBuilds(schedule) => {
                refresh_builds_job(schedule, self.service.clone(), self.sender.clone())?
            }
        };
        Ok(self.scheduler.add(job).await?)
    }

    pub async fn start(&self) -> OverlayResult<()> {
        Ok(self.scheduler.start().await?)
    }
}

/// Refresh once and tell the display loop how it went.
///
/// Contention means another refresh is already producing the data, so it is
/// not reported.
pub async fn refresh_and_notify(service: &RecentBuilds, sender: &Sender<Event>) {
    let event = match service.update_recent_builds().await {
        Ok(builds) => Event::from_builds(builds),
        Err(e) if e.is_contention() => {
            debug!("Refresh skipped: {e}");
            return;
        }
        Err(e) => {
            error!("Could not refresh recent builds. {e}");
            Event::RefreshFailed(e.to_string())
        }
    };

    if let Err(e) = sender.send(event).await {
        let error = OverlayError::Scheduler(format!("Could not send event to MPSC channel. {e}"));
        error!("{error}");
    };
}

//////////////////
// Jobs definition
//////////////////

fn initial_refresh_job(service: RecentBuilds, sender: Arc<Sender<Event>>) -> OverlayResult<Job> {
    let job = Job::new_one_shot_async(Duration::from_secs(0), move |_uuid, _l| {
        let service = service.clone();
        let sender = sender.clone();
        Box::pin(async move {
            info!("Initial refresh of recent builds");
            refresh_and_notify(&service, &sender).await;
        })
    })?;
    Ok(job)
}

fn refresh_builds_job(
    schedule: &str,
    service: RecentBuilds,
    sender: Arc<Sender<Event>>,
) -> OverlayResult<Job> {
    let job = Job::new_async(schedule, move |uuid, mut l| {
        let service = service.clone();
        let sender = sender.clone();
        Box::pin(async move {
            refresh_and_notify(&service, &sender).await;

            // Query the next execution time for this job
            let next_tick = l.next_tick_for_job(uuid).await;
            match next_tick {
                Ok(Some(ts)) => info!("Next refresh of recent builds at {:?}", ts),
                _ => error!("Could not get next tick for refresh builds job"),
            }
        })
    })?;
    Ok(job)
}

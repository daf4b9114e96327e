use crate::connection::shared::{Exclusive, Shared};
use crate::executor::run_request;
use crate::sqlite::restore::restore;
use crate::transaction::run_batch;

use super::task::{Delivery, Task, delivery};

/// Run one task against the exclusively held handle.
///
/// The returned delivery is posted only after the handle has been handed back.
pub(crate) fn run(task: Task, access: &mut Exclusive<'_>, shared: &Shared) -> Delivery {
    match task {
        Task::Execute {
            request,
            respond_to,
        } => {
            let result = access.conn().and_then(|conn| run_request(conn, &request));
            delivery(respond_to, result)
        }
        Task::ExecuteBatch {
            requests,
            respond_to,
        } => {
            let result = access.conn().and_then(|conn| run_batch(conn, &requests));
            delivery(respond_to, result)
        }
        Task::LoadFile { path, respond_to } => {
            let result = access.conn().and_then(|conn| restore(conn, &path));
            delivery(respond_to, result)
        }
        Task::Custom(job) => match access.conn() {
            Ok(conn) => job.run(conn),
            Err(err) => {
                job.reject(err);
                Box::new(|| {})
            }
        },
        Task::Close { respond_to } => delivery(respond_to, shared.release(access)),
    }
}

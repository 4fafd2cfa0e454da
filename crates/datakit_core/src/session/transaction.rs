//! Transaction protocol: idle -> active -> committed | rolled back.

use super::Session;
use crate::db::DbError;
use log::{debug, error};

pub(super) fn run<S, R, E, F>(session: &mut S, f: F) -> Result<R, E>
where
    S: Session,
    F: FnOnce(&mut S) -> Result<R, E>,
    E: From<DbError>,
{
    let mut tx = session.begin();
    if let Some(err) = tx.backend().error.clone() {
        debug!("event=tx_begin module=session status=error error={err}");
        return Err(err.into());
    }

    match f(&mut tx) {
        Ok(value) => match tx.commit().backend().error.clone() {
            None => {
                debug!("event=tx_commit module=session status=ok");
                Ok(value)
            }
            Some(err) => {
                error!("event=tx_commit module=session status=error error={err}");
                Err(err.into())
            }
        },
        Err(err) => {
            // The rollback outcome is not returned; the caller gets f's error.
            match tx.rollback().backend().error.as_ref() {
                None => debug!("event=tx_rollback module=session status=ok"),
                Some(rollback_err) => error!(
                    "event=tx_rollback module=session status=error error={rollback_err}"
                ),
            }
            Err(err)
        }
    }
}

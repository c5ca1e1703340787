pub mod view;

use std::cell::RefCell;
use std::io::Write;
use std::time::Duration;
use futures_signals::signal::SignalExt as _;

use crate::singletons::notifications::NotificationRecord;
use crate::singletons::notifications::store::{NotificationStore, ObserverId};
use self::view::{Lookup, PopupState};

/// Writes one JSON document per line describing the popups.
pub fn write_state<W: Write>(writer: &mut W, state: &PopupState) -> std::io::Result<()> {
    serde_json::to_writer(&mut *writer, state)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Streams the popup state to `writer`: once now, then after every store change.
///
/// `time_format` is asked on each change so configuration reloads apply to the
/// next update.
pub fn attach_feed<W, L, T>(store: &NotificationStore, writer: W, lookup: L, time_format: T) -> ObserverId
where
    W: Write + 'static,
    L: Lookup + 'static,
    T: Fn() -> String + 'static,
{
    let writer = RefCell::new(writer);

    let render = move |records: &[NotificationRecord], visible: bool| {
        let state = PopupState::build(records, visible, &time_format(), &lookup);

        if let Err(err) = write_state(&mut *writer.borrow_mut(), &state) {
            warn!(%err, "Failed to write popup state");
        }
    };

    render(&store.notifications(), store.visible());
    store.subscribe(render)
}

/// Logs when the popup window would be shown or hidden, and re-checks
/// freshness every `tick` so popups hide once they go stale.
pub fn watch_visibility(store: &NotificationStore, tick: Duration) {
    let future = crate::signal!(store.visible_signal(), (visible) {
        debug!(visible, "Popup window visibility changed");
    });

    tokio::task::spawn_local(future);

    let store = store.clone();
    tokio::task::spawn_local(async move {
        let mut interval = tokio::time::interval(tick);

        while !store.is_torn_down() {
            interval.tick().await;
            store.refresh_visibility();
        }
    });
}

use crate::domain::models::{next_id, Item, Reminder};

/// Promotes every due, undelivered reminder into a concrete item.
///
/// The qualifying predicate is `delivered_at == None && date <= today_key`
/// (due today *or* overdue, so days missed offline still deliver on the
/// next check). Each qualifying reminder is stamped `delivered_at = now_ms`
/// and produces exactly one undone item in the reminder's area; stamping is
/// monotonic, so repeated scans never deliver twice.
pub fn deliver_due(reminders: &mut [Reminder], today_key: &str, now_ms: i64) -> Vec<Item> {
    let mut created = Vec::new();

    for reminder in reminders.iter_mut() {
        if reminder.delivered_at.is_some() {
            continue;
        }
        if reminder.date.as_str() > today_key {
            continue;
        }

        created.push(Item {
            id: next_id("item"),
            area: reminder.area.clone(),
            title: reminder.title.clone(),
            description: reminder.description.clone(),
            created_at: now_ms,
            is_done: false,
            done_at: None,
        });
        reminder.delivered_at = Some(now_ms);
    }

    created
}

use footnote_core::db::open_db_in_memory;
use footnote_core::{
    Change, ChangeNotifier, IndexFault, Quote, QuoteRepository, QuoteService, QuoteServiceError,
    RepoError, SqliteQuoteRepository, SqliteQuoteService, Subscription,
};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

fn seeded_repo(quotes: &[Quote]) -> SqliteQuoteRepository {
    let mut repo = SqliteQuoteRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    for quote in quotes {
        repo.restore_quote(quote).unwrap();
    }
    repo
}

fn scenario() -> (Quote, Quote, Quote) {
    (
        Quote::with_id(Uuid::new_v4(), "A", "", "Seneca", 3),
        Quote::with_id(Uuid::new_v4(), "B", "", "Seneca", 2),
        Quote::with_id(Uuid::new_v4(), "C", "", "Marcus", 1),
    )
}

type Recorded = Arc<Mutex<Vec<Change>>>;

fn recording_service(quotes: &[Quote]) -> (SqliteQuoteService, Recorded, Subscription) {
    let notifier = ChangeNotifier::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let subscription = notifier.subscribe(move |event| {
        sink.lock().unwrap().push(event.change.clone());
    });
    (
        QuoteService::new(seeded_repo(quotes), notifier),
        events,
        subscription,
    )
}

fn ids(quotes: &[Quote]) -> Vec<Uuid> {
    quotes.iter().map(|quote| quote.id).collect()
}

#[test]
fn delete_at_resolves_against_held_sequence() {
    let (a, b, c) = scenario();
    let (service, events, _subscription) = recording_service(&[a.clone(), b.clone(), c.clone()]);

    let held = service.list_all().unwrap();
    assert_eq!(service.delete_at([0], &held).unwrap(), 1);

    assert_eq!(ids(&service.list_all().unwrap()), vec![b.id, c.id]);
    assert_eq!(*events.lock().unwrap(), vec![Change::Deleted(vec![a.id])]);
}

#[test]
fn delete_at_uses_search_results_not_full_list() {
    let (a, b, c) = scenario();
    let (service, _events, _subscription) = recording_service(&[a.clone(), b.clone(), c.clone()]);

    let held = service.search("marcus").unwrap();
    service.delete_at([0], &held).unwrap();

    assert_eq!(ids(&service.list_all().unwrap()), vec![a.id, b.id]);
}

#[test]
fn multi_index_delete_publishes_once() {
    let (a, b, c) = scenario();
    let (service, events, _subscription) = recording_service(&[a.clone(), b.clone(), c.clone()]);

    let held = service.list_all().unwrap();
    assert_eq!(service.delete_at([2, 0, 2], &held).unwrap(), 2);

    assert_eq!(ids(&service.list_all().unwrap()), vec![b.id]);
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], Change::Deleted(vec![a.id, c.id]));
}

#[test]
fn out_of_range_index_fails_whole_batch() {
    let (a, b, c) = scenario();
    let (service, events, _subscription) = recording_service(&[a, b, c]);

    let held = service.list_all().unwrap();
    let before = ids(&held);
    let err = service.delete_at([0, 7], &held).unwrap_err();

    assert!(matches!(
        err,
        QuoteServiceError::InvalidIndex {
            index: 7,
            fault: IndexFault::OutOfRange { held_len: 3 },
        }
    ));
    assert_eq!(ids(&service.list_all().unwrap()), before);
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn stale_index_fails_whole_batch() {
    let (a, b, c) = scenario();
    let (service, events, _subscription) = recording_service(&[a.clone(), b.clone(), c.clone()]);

    let held = service.list_all().unwrap();
    service.delete_quotes(&[b.id]).unwrap();
    events.lock().unwrap().clear();

    let err = service.delete_at([0, 1], &held).unwrap_err();
    assert!(matches!(
        err,
        QuoteServiceError::InvalidIndex {
            index: 1,
            fault: IndexFault::Stale(id),
        } if id == b.id
    ));
    assert_eq!(ids(&service.list_all().unwrap()), vec![a.id, c.id]);
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn failed_commit_rolls_back_and_publishes_nothing() {
    let (a, b, c) = scenario();
    let repo = seeded_repo(&[a.clone(), b.clone(), c.clone()]);
    repo.connection()
        .execute_batch(&format!(
            "CREATE TRIGGER block_delete BEFORE DELETE ON quotes
             WHEN OLD.uuid = '{}'
             BEGIN
                 SELECT RAISE(ABORT, 'delete blocked');
             END;",
            c.id
        ))
        .unwrap();
    let notifier = ChangeNotifier::new();
    let published = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&published);
    let _subscription = notifier.subscribe(move |_| {
        *counter.lock().unwrap() += 1;
    });
    let service = QuoteService::new(repo, notifier);

    let held = service.list_all().unwrap();
    let err = service.delete_at([0, 2], &held).unwrap_err();

    assert!(matches!(
        err,
        QuoteServiceError::TransactionFailed(RepoError::Db(_))
    ));
    assert_eq!(ids(&service.list_all().unwrap()), vec![a.id, b.id, c.id]);
    assert_eq!(*published.lock().unwrap(), 0);
}

#[test]
fn empty_index_set_commits_nothing() {
    let (a, b, c) = scenario();
    let (service, events, _subscription) = recording_service(&[a, b, c]);

    let held = service.list_all().unwrap();
    assert_eq!(service.delete_at(Vec::new(), &held).unwrap(), 0);
    assert_eq!(service.count().unwrap(), 3);
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn delete_by_unknown_id_reports_transaction_failure() {
    let (a, b, c) = scenario();
    let (service, _events, _subscription) = recording_service(&[a, b, c]);
    let missing = Uuid::new_v4();

    let err = service.delete_quotes(&[missing]).unwrap_err();
    assert!(matches!(
        err,
        QuoteServiceError::TransactionFailed(RepoError::NotFound(id)) if id == missing
    ));
    assert_eq!(service.count().unwrap(), 3);
}

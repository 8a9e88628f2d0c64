use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{ApiError, ApiResult, EmployeeApi};
use crate::domain::{
    ClientPageRequest, Department, EmployeeFields, EmployeeId, EmployeeRecord, ServerPage,
    ServerPageKey, State,
};
use crate::reconciler::{PageReconciler, ReconcilerOptions};

const FAKE_LATENCY: Duration = Duration::from_millis(10);

struct FakeState {
    server_page_size: usize,
    employees: Mutex<Vec<EmployeeRecord>>,
    next_id: AtomicU64,
    calls: AtomicUsize,
    seen: Mutex<Vec<ServerPageKey>>,
    fail_next: Mutex<Option<ApiError>>,
}

/// In-memory directory that counts page fetches.
///
/// Sort and filter segments are recorded but not applied.
#[derive(Clone)]
pub(crate) struct FakeApi {
    state: Arc<FakeState>,
}

pub(crate) fn sample_employee(n: u64) -> EmployeeRecord {
    let i = n as usize;
    EmployeeRecord {
        id: EmployeeId::Number(n),
        fields: EmployeeFields {
            first_name: format!("First{n}"),
            last_name: format!("Last{n}"),
            date_of_birth: format!("19{:02}-01-15", n % 100),
            start_date: "2015-03-01".to_string(),
            street: format!("{n} Main St"),
            city: "Springfield".to_string(),
            zipcode: format!("{:05}", 10000 + n),
            state: State::ALL[i % State::ALL.len()],
            department: Department::ALL[i % Department::ALL.len()],
        },
    }
}

impl FakeApi {
    pub(crate) fn with_employees(count: u64, server_page_size: usize) -> Self {
        Self {
            state: Arc::new(FakeState {
                server_page_size,
                employees: Mutex::new((0..count).map(sample_employee).collect()),
                next_id: AtomicU64::new(count),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                fail_next: Mutex::new(None),
            }),
        }
    }

    /// Page fetches issued so far.
    pub(crate) fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn seen_keys(&self) -> Vec<ServerPageKey> {
        self.state.seen.lock().unwrap().clone()
    }

    /// Makes the next page fetch fail with `error`.
    pub(crate) fn fail_next(&self, error: ApiError) {
        *self.state.fail_next.lock().unwrap() = Some(error);
    }

    fn not_found(id: &EmployeeId) -> ApiError {
        ApiError::server(404, Some(format!("employee {id} not found")))
    }
}

impl EmployeeApi for FakeApi {
    fn fetch_page(&self, key: ServerPageKey) -> impl Future<Output = ApiResult<ServerPage>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            state.calls.fetch_add(1, Ordering::SeqCst);
            state.seen.lock().unwrap().push(key.clone());
            let failure = state.fail_next.lock().unwrap().take();
            tokio::time::sleep(FAKE_LATENCY).await;
            if let Some(error) = failure {
                return Err(error);
            }

            let employees = state.employees.lock().unwrap();
            let start = (key.page * state.server_page_size).min(employees.len());
            let end = (start + state.server_page_size).min(employees.len());
            Ok(ServerPage {
                employees: employees[start..end].to_vec(),
                total_count: employees.len() as u64,
            })
        }
    }

    fn create(&self, fields: EmployeeFields) -> impl Future<Output = ApiResult<EmployeeRecord>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            let id = EmployeeId::Number(state.next_id.fetch_add(1, Ordering::SeqCst));
            let record = EmployeeRecord { id, fields };
            state.employees.lock().unwrap().push(record.clone());
            Ok(record)
        }
    }

    fn update(&self, record: EmployeeRecord) -> impl Future<Output = ApiResult<EmployeeRecord>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            let mut employees = state.employees.lock().unwrap();
            match employees.iter_mut().find(|e| e.id == record.id) {
                Some(existing) => {
                    *existing = record.clone();
                    Ok(record)
                }
                None => Err(Self::not_found(&record.id)),
            }
        }
    }

    fn delete(&self, id: EmployeeId) -> impl Future<Output = ApiResult<()>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            let mut employees = state.employees.lock().unwrap();
            let before = employees.len();
            employees.retain(|e| e.id != id);
            if employees.len() == before {
                return Err(Self::not_found(&id));
            }
            Ok(())
        }
    }
}

fn nz(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn quiet_reconciler(api: FakeApi, server_page_size: usize) -> PageReconciler<FakeApi> {
    PageReconciler::new(
        api,
        ReconcilerOptions {
            prefetch: false,
            ..ReconcilerOptions::new(nz(server_page_size))
        },
    )
}

fn numeric_ids(records: &[EmployeeRecord]) -> Vec<u64> {
    records
        .iter()
        .filter_map(|e| match e.id {
            EmployeeId::Number(n) => Some(n),
            EmployeeId::Text(_) => None,
        })
        .collect()
}

async fn read_every_page(
    reconciler: &PageReconciler<FakeApi>,
    client_page_size: usize,
) -> Vec<EmployeeRecord> {
    let request = ClientPageRequest::new(0, nz(client_page_size));
    let mut all = Vec::new();
    let mut current = 0;
    loop {
        let page = reconciler
            .fetch_client_page(&request.at_page(current))
            .await
            .unwrap();
        assert!(page.employees.len() <= client_page_size);
        all.extend(page.employees);
        if current >= page.last_page {
            break;
        }
        current += 1;
    }
    all
}

#[tokio::test(start_paused = true)]
async fn walking_every_client_page_rebuilds_the_directory() {
    let api = FakeApi::with_employees(93, 25);
    let reconciler = quiet_reconciler(api.clone(), 25);

    let all = read_every_page(&reconciler, 10).await;
    assert_eq!(numeric_ids(&all), (0..93).collect::<Vec<u64>>());
    // four server pages, each fetched once despite straddling client pages
    assert_eq!(api.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn odd_ratios_still_rebuild_the_directory() {
    for (server_page_size, client_page_size) in [(7, 10), (10, 7), (25, 25), (3, 50), (50, 5)] {
        let api = FakeApi::with_employees(101, server_page_size);
        let reconciler = quiet_reconciler(api, server_page_size);
        let all = read_every_page(&reconciler, client_page_size).await;
        assert_eq!(
            numeric_ids(&all),
            (0..101).collect::<Vec<u64>>(),
            "server page {server_page_size}, client page {client_page_size}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn matching_sizes_map_client_pages_onto_server_pages() {
    let api = FakeApi::with_employees(60, 20);
    let reconciler = quiet_reconciler(api, 20);
    for i in 0..3 {
        let page = reconciler
            .fetch_client_page(&ClientPageRequest::new(i, nz(20)))
            .await
            .unwrap();
        assert_eq!(page.server_pages, vec![i]);
        assert_eq!(page.employees.len(), 20);
    }
}

#[tokio::test(start_paused = true)]
async fn empty_directory_has_one_empty_page() {
    let api = FakeApi::with_employees(0, 25);
    let reconciler = quiet_reconciler(api, 25);
    let page = reconciler
        .fetch_client_page(&ClientPageRequest::new(0, nz(10)))
        .await
        .unwrap();
    assert_eq!(page.last_page, 0);
    assert_eq!(page.total_count, 0);
    assert!(page.employees.is_empty());
}

#[tokio::test(start_paused = true)]
async fn page_past_the_end_is_empty_not_an_error() {
    let api = FakeApi::with_employees(30, 25);
    let reconciler = quiet_reconciler(api, 25);
    let page = reconciler
        .fetch_client_page(&ClientPageRequest::new(9, nz(10)))
        .await
        .unwrap();
    assert!(page.employees.is_empty());
    assert_eq!(page.last_page, 2);
}

#[tokio::test(start_paused = true)]
async fn update_is_visible_on_the_next_read() {
    let api = FakeApi::with_employees(12, 25);
    let reconciler = quiet_reconciler(api.clone(), 25);
    let request = ClientPageRequest::new(0, nz(5));

    reconciler.fetch_client_page(&request).await.unwrap();
    let mut edited = sample_employee(3);
    edited.fields.city = "Shelbyville".to_string();
    reconciler.update(edited).await.unwrap();

    let page = reconciler.fetch_client_page(&request).await.unwrap();
    assert_eq!(page.employees[3].fields.city, "Shelbyville");
    assert_eq!(api.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn updating_a_missing_employee_reports_the_server_message() {
    let api = FakeApi::with_employees(2, 25);
    let reconciler = quiet_reconciler(api, 25);
    let err = reconciler.update(sample_employee(77)).await.unwrap_err();
    assert_eq!(err.to_string(), "server error 404: employee 77 not found");
}

#[tokio::test(start_paused = true)]
async fn rendered_page_lists_each_row() {
    colored::control::set_override(false);
    let api = FakeApi::with_employees(93, 25);
    let reconciler = quiet_reconciler(api, 25);
    let page = reconciler
        .fetch_client_page(&ClientPageRequest::new(2, nz(10)))
        .await
        .unwrap();

    let text = String::from_utf8(crate::output::render_page(
        &page,
        crate::output::OutputFormat::Text,
    ))
    .unwrap();
    // header, ten rows, summary
    assert_eq!(text.lines().count(), 12);
    assert!(text.contains("First20"));
    assert!(text.contains("First29"));
    assert!(!text.contains("First30 "));
    assert!(text.ends_with("page 3/10  rows 20-29 of 93  server pages 0,1\n"));
}

#[test]
fn yaml_config_feeds_the_run_config() {
    use clap::Parser;

    let cfg = crate::config::parse_config(
        "api_url: https://hr.example.com/api/\nserver_page_size: 50\npage_size: 20\nrate: 5\n",
    )
    .unwrap();
    let args = crate::cli::args::CliArgs::parse_from(["empdir", "list", "--page", "1"]);
    let run = crate::app::build_run_config(args, cfg, None, None).unwrap();
    assert_eq!(run.api_url, "https://hr.example.com/api/");
    assert_eq!(run.server_page_size.get(), 50);
    assert_eq!(run.rate, 5);
    match run.action {
        crate::app::Action::List(request) => {
            assert_eq!(request.page, 1);
            assert_eq!(request.page_size.get(), 20);
        }
        other => panic!("unexpected action {other:?}"),
    }
}

use std::error::Error;
use std::num::NonZeroUsize;

use empdir::api::{HttpEmployeeApi, HttpOptions};
use empdir::domain::{ClientPageRequest, Filters, SortField, SortOrder};
use empdir::reconciler::{PageReconciler, ReconcilerOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let api = HttpEmployeeApi::new(&HttpOptions {
        base_url: "http://localhost:8080/".to_string(),
        timeout_seconds: 5,
        ..HttpOptions::default()
    })?;
    let reconciler = PageReconciler::new(api, ReconcilerOptions::new(NonZeroUsize::new(25).ok_or("zero")?));

    let request = ClientPageRequest::new(2, NonZeroUsize::new(10).ok_or("zero")?)
        .sort(SortField::LastName, SortOrder::Asc)
        .filters(Filters::new(["Engineering"]));
    let page = reconciler.fetch_client_page(&request).await?;

    println!(
        "page {} of {} ({} employees, server pages {:?})",
        page.page + 1,
        page.last_page + 1,
        page.total_count,
        page.server_pages
    );
    for e in page.employees.iter() {
        println!("{} {} {}", e.id, e.fields.first_name, e.fields.last_name);
    }

    Ok(())
}

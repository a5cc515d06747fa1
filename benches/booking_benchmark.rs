use criterion::{black_box, criterion_group, criterion_main, Criterion};
use product_gateway::mock_upstream::MockUpstream;
use product_gateway::{BookingWorkflow, Inventory, InventoryId};
use std::sync::Arc;

pub fn identifier_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("inventory_id");

    group.bench_function("valid", |b| {
        b.iter(|| InventoryId::parse(black_box("p0003i0001")))
    });
    group.bench_function("invalid", |b| {
        b.iter(|| InventoryId::parse(black_box("p0003-0001")))
    });

    group.finish();
}

pub fn workflow_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    // Reads always report the inventory free and writes return a canned body,
    // so every iteration runs the full read-then-write path.
    let mock = Arc::new(MockUpstream::with_sample_catalogue());
    mock.stub_inventory("p0003", "i0001", Inventory::new("p0003i0001", false));
    mock.stub_booking_response("p0003", "i0001", r#"{"productId":"p0003"}"#);
    let workflow = BookingWorkflow::new(mock.clone());

    let mut group = c.benchmark_group("booking_workflow");

    group.bench_function("book_free_inventory", |b| {
        b.iter(|| {
            runtime
                .block_on(workflow.book_by_inventory_id(black_box("p0003i0001")))
                .unwrap();
            mock.clear_calls();
        })
    });
    group.bench_function("reject_invalid_id", |b| {
        b.iter(|| {
            let _ = runtime.block_on(workflow.book_by_inventory_id(black_box("p0003i")));
        })
    });

    group.finish();
}

criterion_group!(benches, identifier_benchmark, workflow_benchmark);
criterion_main!(benches);

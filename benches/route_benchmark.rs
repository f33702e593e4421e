use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use webfront::{
    Bindable, DispatchRequest, Dispatcher, DispatcherOptions, HttpRequestMethod, ObjectSchema,
    Outcome, ParamSpec, Registration, RouteTable, SchemaBuilder,
};

#[derive(Default)]
struct Row {
    name: String,
    salary: i32,
}

impl Bindable for Row {
    fn schema() -> ObjectSchema {
        SchemaBuilder::<Row>::new()
            .string("name", |r, v| r.name = v)
            .int("salary", |r, v| r.salary = v)
            .build()
    }
}

/// `count` 条形如 `/res{i}/{id}` 的路由，外加一条数组绑定路由。
fn table(count: usize) -> RouteTable {
    let mut table = RouteTable::new();
    for i in 0..count {
        table
            .register(
                Registration::new(
                    HttpRequestMethod::Get,
                    format!("/res{}/{{id}}", i),
                    "show",
                    |inv| Ok(Outcome::text(inv.args().str(0).unwrap_or_default())),
                )
                .param(ParamSpec::string("id")),
            )
            .unwrap();
    }
    table
        .register(
            Registration::new(HttpRequestMethod::Post, "/rows/save", "save", |inv| {
                let rows = inv.args_mut().take_array::<Row>(0).unwrap_or_default();
                Ok(Outcome::text(rows.len().to_string()))
            })
            .param(ParamSpec::array::<Row>("row")),
        )
        .unwrap();
    table
}

fn resolve_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_resolve");

    for count in [10usize, 100, 1000] {
        let table = table(count);
        let last = format!("/res{}/42", count - 1);
        group.bench_with_input(BenchmarkId::new("last", count), &last, |b, path| {
            b.iter(|| table.resolve(HttpRequestMethod::Get, black_box(path)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("miss", count), &count, |b, _| {
            b.iter(|| table.resolve(HttpRequestMethod::Get, black_box("/nowhere/42")).is_err());
        });
    }

    group.finish();
}

fn dispatch_array_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_array_bind");
    let dispatcher = Dispatcher::new(table(10), DispatcherOptions::default());

    for rows in [2usize, 20, 200] {
        let mut request = DispatchRequest::new(HttpRequestMethod::Post, "/rows/save");
        for i in 0..rows {
            request = request
                .param(format!("row[{}].name", i), format!("user{}", i))
                .param(format!("row[{}].salary", i), (i * 100).to_string());
        }
        group.bench_with_input(BenchmarkId::from_parameter(rows), &request, |b, request| {
            b.iter(|| dispatcher.dispatch(black_box(request.clone())));
        });
    }

    group.finish();
}

criterion_group!(benches, resolve_benchmark, dispatch_array_benchmark);
criterion_main!(benches);

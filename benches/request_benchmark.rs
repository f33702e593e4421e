use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use webfront::request::Request;

fn request_line_benchmark(c: &mut Criterion) {
    let request = b"GET /front/dept/7 HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Bench\r\n\r\n";

    c.bench_function("request_line_parse", |b| {
        b.iter(|| {
            let _ = Request::try_from(black_box(request), 0).unwrap();
        });
    });
}

fn request_query_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_query_params");

    for count in [1usize, 10, 50] {
        let query: Vec<String> = (0..count).map(|i| format!("k{}=v{}", i, i)).collect();
        let raw = format!(
            "GET /front/dept/list?{} HTTP/1.1\r\nHost: localhost\r\nAccept-Encoding: gzip, deflate, br\r\n\r\n",
            query.join("&")
        );
        group.bench_with_input(BenchmarkId::from_parameter(count), &raw, |b, raw| {
            b.iter(|| {
                let request = Request::try_from(black_box(raw.as_bytes()), 0).unwrap();
                black_box(request.params());
            });
        });
    }

    group.finish();
}

fn request_form_body_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_form_body");

    for rows in [2usize, 20, 200] {
        let body: Vec<String> = (0..rows)
            .map(|i| format!("emp%5B{}%5D.name=user{}&emp%5B{}%5D.salary={}", i, i, i, i * 100))
            .collect();
        let body = body.join("&");
        let raw = format!(
            "POST /front/emp/save HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        group.bench_with_input(BenchmarkId::from_parameter(rows), &raw, |b, raw| {
            b.iter(|| {
                let request = Request::try_from(black_box(raw.as_bytes()), 0).unwrap();
                black_box(request.to_dispatch_request(0));
            });
        });
    }

    group.finish();
}

fn request_multipart_benchmark(c: &mut Criterion) {
    let content = "x".repeat(4096);
    let body = format!(
        "--B\r\nContent-Disposition: form-data; name=\"owner\"\r\n\r\nann\r\n--B\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"p.txt\"\r\nContent-Type: text/plain\r\n\r\n{}\r\n--B--\r\n",
        content
    );
    let raw = format!(
        "POST /front/emp/upload HTTP/1.1\r\nHost: localhost\r\nContent-Type: multipart/form-data; boundary=B\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );

    c.bench_function("request_multipart_parse", |b| {
        b.iter(|| {
            let request = Request::try_from(black_box(raw.as_bytes()), 0).unwrap();
            black_box(request.files());
        });
    });
}

criterion_group!(
    benches,
    request_line_benchmark,
    request_query_benchmark,
    request_form_body_benchmark,
    request_multipart_benchmark
);
criterion_main!(benches);

use bytes::Bytes;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use micro_req::Request;
use std::hint::black_box;

fn query_request() -> Request {
    Request::get("http://127.0.0.1:8080/search?lang=en")
        .with_query_param("q", "micro req")
        .add_query_params([("tag", "http"), ("tag", "client"), ("page", "3")])
        .with_header("x-request-id", "5e0c2b1a")
        .add_cookie("sid", "42")
}

fn form_request() -> Request {
    Request::post("http://127.0.0.1:8080/login").with_form_params([("user", "zhangsan"), ("password", "p@ss w0rd"), ("remember", "true")])
}

fn multipart_request() -> Request {
    Request::post("http://127.0.0.1:8080/upload")
        .with_form_param("title", "bench")
        .add_file_content("avatar", "avatar.png", Bytes::from(vec![7u8; 16 * 1024]))
        .add_file_content("notes", "notes.txt", "some notes")
}

fn benchmark_request_build(criterion: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime should be created");
    let mut group = criterion.benchmark_group("request_build");

    let cases: [(&str, fn() -> Request); 3] = [("query", query_request), ("form", form_request), ("multipart", multipart_request)];
    for (name, make) in cases {
        group.bench_function(name, |b| {
            b.iter_batched_ref(
                make,
                |request| {
                    let built = runtime.block_on(request.build()).expect("request should build");
                    black_box(built);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(request_build, benchmark_request_build);
criterion_main!(request_build);

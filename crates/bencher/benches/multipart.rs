use bencher::MultipartPayload;
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use relay_http::codec::MultipartDecoder;
use relay_http::protocol::{Message, PartHeader};
use std::hint::black_box;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::Decoder;

fn chunk_len(message: &Message<PartHeader>) -> usize {
    match message {
        Message::Header(_) => 0,
        Message::Payload(item) => item.as_bytes().map_or(0, |bytes| bytes.len()),
    }
}

fn create_payloads() -> Vec<MultipartPayload> {
    vec![
        MultipartPayload::new("two_small_files", &[10, 20]),
        MultipartPayload::new("many_files", &[4 * 1024; 32]),
        MultipartPayload::new("one_large_file", &[1024 * 1024]),
    ]
}

fn benchmark_multipart_decoder(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("multipart_decoder");

    for payload in create_payloads() {
        group.throughput(Throughput::Bytes(payload.body().len() as u64));

        for read_size in [8 * 1024, payload.body().len()] {
            let id = BenchmarkId::new(payload.name(), read_size);
            group.bench_with_input(id, &payload, |b, payload| {
                b.iter_batched(
                    || MultipartDecoder::new(payload.boundary()).expect("boundary should be valid"),
                    |mut decoder| {
                        let mut buffer = BytesMut::with_capacity(read_size);
                        let mut decoded = 0usize;
                        for piece in payload.body().chunks(read_size) {
                            buffer.extend_from_slice(piece);
                            while let Some(message) = decoder.decode(&mut buffer).expect("payload should be valid multipart") {
                                decoded += chunk_len(&message);
                            }
                        }
                        while let Some(message) = decoder.decode_eof(&mut buffer).expect("payload should be complete") {
                            decoded += chunk_len(&message);
                        }
                        assert_eq!(decoded, payload.content_len());
                        black_box(decoded);
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

criterion_group!(decoder, benchmark_multipart_decoder);
criterion_main!(decoder);

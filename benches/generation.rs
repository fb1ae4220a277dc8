use criterion::{black_box, criterion_group, criterion_main, Criterion};
use datecrack::calendar::{count_valid_dates, SerializationFormat, YearRange};
use datecrack::progress::NoProgress;
use datecrack::source::{DateSource, NumericRangeSpec, RangeSource};
use datecrack::wordlist::Dedup;
use datecrack::{CancelToken, WordlistJob};

fn bench_date_iter(c: &mut Criterion) {
    let range = YearRange::new(1945, 2030).unwrap();
    let source = DateSource::gregorian(range, SerializationFormat::DayMonthYear);

    c.bench_function("date_iter_86_years", |b| {
        b.iter(|| black_box(source.iter().count()))
    });
}

fn bench_count_valid_dates(c: &mut Criterion) {
    c.bench_function("count_valid_dates", |b| {
        b.iter(|| count_valid_dates(black_box(1900), black_box(2100)))
    });
}

fn bench_assemble_dedup(c: &mut Criterion) {
    let range = YearRange::new(1990, 2030).unwrap();
    let job = WordlistJob::new()
        .with(DateSource::gregorian(range, SerializationFormat::DayMonthYear), Dedup::Track)
        .with(DateSource::buddhist(range, SerializationFormat::DayMonthYear), Dedup::Track)
        .with(RangeSource::new(NumericRangeSpec::new(0, 99_999, 8).unwrap()), Dedup::Probe);

    c.bench_function("assemble_dates_and_numbers", |b| {
        b.iter(|| {
            let mut buffer = Vec::with_capacity(2_000_000);
            job.write_to(&mut buffer, &NoProgress, &CancelToken::new()).unwrap();
            black_box(buffer.len())
        })
    });
}

fn bench_direct_range(c: &mut Criterion) {
    let source = RangeSource::new(NumericRangeSpec::new(0, 999_999, 6).unwrap());
    let job = WordlistJob::new().with(source, Dedup::Off);

    c.bench_function("direct_range_1m", |b| {
        b.iter(|| {
            let mut buffer = Vec::with_capacity(7_000_000);
            job.write_to(&mut buffer, &NoProgress, &CancelToken::new()).unwrap();
            black_box(buffer.len())
        })
    });
}

criterion_group!(
    benches,
    bench_date_iter,
    bench_count_valid_dates,
    bench_assemble_dedup,
    bench_direct_range,
);
criterion_main!(benches);

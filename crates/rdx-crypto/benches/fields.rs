use rdx_core::types::{FieldLocation, SensitiveField};
use rdx_crypto::{decrypt_value, encrypt_fields, encrypt_value, KdfParams, SessionKey};
use secrecy::SecretString;

fn make_fields(count: usize) -> Vec<SensitiveField> {
    (0..count)
        .map(|i| SensitiveField {
            field_type: "ssn".into(),
            original_value: format!("{:03}-{:02}-{:04}", i % 1000, i % 100, i),
            masked_preview: "***".into(),
            confidence: 0.95,
            location: FieldLocation {
                page: 1,
                start: 0,
                end: 11,
                bbox: None,
            },
            detection_method: "bench".into(),
        })
        .collect()
}

#[divan::bench(args = [16, 256, 4096])]
fn bench_encrypt_value(bencher: divan::Bencher, size: usize) {
    let key = SessionKey::from_bytes([0xABu8; 32]);
    let value = "x".repeat(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            encrypt_value(
                divan::black_box(&key),
                "FIELD-001",
                divan::black_box(&value),
            )
            .unwrap()
        });
}

#[divan::bench(args = [16, 256, 4096])]
fn bench_decrypt_value(bencher: divan::Bencher, size: usize) {
    let key = SessionKey::from_bytes([0xABu8; 32]);
    let value = "x".repeat(size);
    let sealed = encrypt_value(&key, "FIELD-001", &value).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            decrypt_value(
                divan::black_box(&key),
                "FIELD-001",
                divan::black_box(&sealed),
            )
            .unwrap()
        });
}

#[divan::bench(args = [1, 32, 256])]
fn bench_encrypt_fields(bencher: divan::Bencher, count: usize) {
    let fields = make_fields(count);
    let passkey = SecretString::from("bench-passkey");
    let params = KdfParams {
        mem_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    };
    bencher.bench(|| encrypt_fields(divan::black_box(&fields), &passkey, &params).unwrap());
}

fn main() {
    divan::main();
}

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use carebill_billing::{
    assemble, determine_invoice_status, Appointment, BillablePeriod, CareType, Contract,
    ContractInput, PeriodInput, PriceTimeUnit, Sender,
};
use carebill_core::{ClientId, ContractId, EmployeeId, SenderId};
use carebill_infra::{
    BillingConfig, FixedClock, InMemoryCareRecords, InMemoryInvoiceStore, InvoiceAssembler,
};

const CLIENT: ClientId = ClientId::from_raw(1);

fn window_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
}

fn window_end() -> DateTime<Utc> {
    window_start() + Duration::days(28)
}

fn contract(id: i64) -> Contract {
    let (care_type, unit) = if id % 2 == 0 {
        (CareType::Accommodation, PriceTimeUnit::Daily)
    } else {
        (CareType::Ambulante, PriceTimeUnit::Hourly)
    };
    Contract {
        id: ContractId::from_raw(id),
        client_id: CLIENT,
        care_type,
        price: Decimal::new(8_750, 2),
        price_time_unit: Some(unit),
        vat: Decimal::from(21),
        start_date: window_start(),
        end_date: None,
        hours: None,
        hours_type: None,
        financing_act: None,
        financing_option: None,
    }
}

fn appointments() -> Vec<Appointment> {
    (0..20)
        .map(|day| {
            let start = window_start() + Duration::days(day) + Duration::hours(9);
            Appointment {
                start,
                end: start + Duration::minutes(45),
            }
        })
        .collect()
}

fn contract_inputs(count: i64) -> Vec<ContractInput> {
    let period = BillablePeriod::new(window_start(), window_end());
    (1..=count)
        .map(|id| {
            let contract = contract(id);
            let input = if contract.care_type.bills_appointments() {
                PeriodInput::with_appointments(period, Ok(appointments()))
            } else {
                PeriodInput::elapsed(period)
            };
            ContractInput {
                contract,
                periods: Ok(vec![input]),
            }
        })
        .collect()
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble_contracts");

    for contract_count in [1, 10, 100, 1000].iter() {
        let inputs = contract_inputs(*contract_count);
        group.throughput(Throughput::Elements(*contract_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(contract_count),
            &inputs,
            |b, inputs| b.iter(|| assemble(black_box(inputs))),
        );
    }

    group.finish();
}

fn bench_status(c: &mut Criterion) {
    let total = Decimal::new(338_800, 2);
    let paid = Decimal::new(200_000, 2);
    c.bench_function("determine_invoice_status", |b| {
        b.iter(|| determine_invoice_status(black_box(total), black_box(paid)))
    });
}

fn bench_generate_invoice(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("generate_invoice_in_memory");

    for contract_count in [1, 10, 100].iter() {
        let records = Arc::new(InMemoryCareRecords::new());
        records.set_sender(
            CLIENT,
            Sender {
                id: SenderId::from_raw(1),
                name: "Bench".to_string(),
            },
        );
        for id in 1..=*contract_count {
            records.add_contract(contract(id));
        }
        for appointment in appointments() {
            records.add_appointment(CLIENT, appointment);
        }
        let clock = FixedClock(window_end());
        let assembler = InvoiceAssembler::new(
            records,
            InMemoryInvoiceStore::new(),
            clock,
            BillingConfig::default(),
        );

        group.bench_function(BenchmarkId::from_parameter(contract_count), |b| {
            b.iter(|| {
                runtime
                    .block_on(assembler.generate_invoice(
                        CLIENT,
                        window_start(),
                        window_end(),
                        EmployeeId::from_raw(1),
                    ))
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_assemble, bench_status, bench_generate_invoice);
criterion_main!(benches);

//! End-to-end scenarios against the `HostAdapter` reference adapter, one
//! per resource kind plus the cross-cutting allocation/exhaustion cases.

use std::time::Duration;

use osal_core::host_adapter::HostAdapter;
use osal_core::{Config, OsalError};

type Osal = osal_core::Osal<HostAdapter>;

fn osal() -> Osal {
    let _ = env_logger::builder().is_test(true).try_init();
    Osal::init(Config::default(), HostAdapter::new()).unwrap()
}

#[test]
fn binsem_create_take_give_delete() {
    let o = osal();
    let h = o.bin_semaphores.create("s1", 32, 1).unwrap();
    assert!(h.is_defined());
    o.bin_semaphores.take(h).unwrap();
    o.bin_semaphores.give(h).unwrap();
    o.bin_semaphores.delete(h).unwrap();
    assert_eq!(o.bin_semaphores.take(h), Err(OsalError::InvalidId));
}

#[test]
fn queue_get_into_undersized_buffer_rejected() {
    let o = osal();
    let q = o.queues.create("q", 32, 4, 8, 256).unwrap();
    o.queues.put(q, &[0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18]).unwrap();
    // This crate's `get` returns an owned Vec sized to the message rather
    // than filling a caller buffer, so the undersized-destination case
    // from the legacy C API surfaces as a size mismatch the caller must
    // check; exercise that by round-tripping the exact message size.
    let got = o.queues.get(q).unwrap();
    assert_eq!(got, vec![0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18]);
}

#[test]
fn queue_put_over_max_size_rejected() {
    let o = osal();
    let q = o.queues.create("q", 32, 4, 4, 256).unwrap();
    assert_eq!(o.queues.put(q, &[0u8; 8]), Err(OsalError::QueueInvalidSize));
}

#[test]
fn filesystem_mount_and_translate_path() {
    let o = osal();
    o.filesystems.initialize("ram0", "RAM0", 512, 200, 32, None, false).unwrap();
    o.filesystems.mount("ram0", "/cf", 64).unwrap();

    let out = o
        .filesystems
        .translate_path("/cf/data/x.bin", o.config().max_file_name, o.config().max_local_path_len)
        .unwrap();
    assert_eq!(out, "/data/x.bin");

    assert_eq!(
        o.filesystems
            .translate_path("/cf/", o.config().max_file_name, o.config().max_local_path_len),
        Err(OsalError::FsPathInvalid)
    );
    assert_eq!(
        o.filesystems
            .translate_path("cf/x", o.config().max_file_name, o.config().max_local_path_len),
        Err(OsalError::FsPathInvalid)
    );
}

#[test]
fn name_collision_on_second_create_fails() {
    let o = osal();
    o.bin_semaphores.create("dup", 32, 0).unwrap();
    assert_eq!(o.bin_semaphores.create("dup", 32, 0), Err(OsalError::NameTaken));
}

#[test]
fn table_exhaustion_reports_no_free_ids() {
    let cfg = Config {
        max_bin_semaphores: 2,
        ..Config::default()
    };
    let o = osal_core::Osal::init(cfg, HostAdapter::new()).unwrap();
    o.bin_semaphores.create("a", 32, 0).unwrap();
    o.bin_semaphores.create("b", 32, 0).unwrap();
    assert_eq!(o.bin_semaphores.create("c", 32, 0), Err(OsalError::NoFreeIds));
}

#[test]
fn timer_one_shot_then_periodic() {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    let o = osal();
    let tb = o.timebases.create("tb1", 32).unwrap();

    let one_shot_fires = Arc::new(AtomicU32::new(0));
    let f = one_shot_fires.clone();
    o.timebases
        .add_timer(tb, "once", 32, 2_500, 0, move || {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let periodic_fires = Arc::new(AtomicU32::new(0));
    let f2 = periodic_fires.clone();
    o.timebases
        .add_timer(tb, "periodic", 32, 1_000, 1_000, move || {
            f2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(one_shot_fires.load(Ordering::SeqCst), 1);
    assert!(periodic_fires.load(Ordering::SeqCst) >= 2);
}

#[test]
fn for_each_object_visits_objects_across_every_table() {
    let o = osal();
    o.bin_semaphores.create("s1", 32, 0).unwrap();
    o.queues.create("q1", 32, 2, 16, 256).unwrap();
    o.mutexes.create("m1", 32).unwrap();

    let mut names = Vec::new();
    o.for_each_object(None, |_id, name, _creator| names.push(name.to_string()));
    names.sort();
    assert_eq!(names, vec!["m1", "q1", "s1"]);
}

#[test]
fn for_each_object_filters_by_creator() {
    let o = osal();
    o.bin_semaphores.create("s1", 32, 0).unwrap();

    let mut unmatched = Vec::new();
    o.for_each_object(Some(osal_core::ObjectId::from_u32(0xdead_beef)), |_id, name, _c| {
        unmatched.push(name.to_string())
    });
    assert!(unmatched.is_empty());
}

#[test]
fn timer_api_rejected_from_within_a_callback() {
    use std::sync::{Arc, Mutex};

    let o = Arc::new(osal());
    let tb = o.timebases.create("tb2", 32).unwrap();
    let nested_result = Arc::new(Mutex::new(None));

    let o2 = o.clone();
    let slot = nested_result.clone();
    o.timebases
        .add_timer(tb, "reentrant", 32, 1_000, 0, move || {
            let nested = o2.timebases.add_timer(tb, "nested", 32, 1_000, 0, || {});
            *slot.lock().unwrap() = Some(nested);
        })
        .unwrap();

    std::thread::sleep(Duration::from_millis(100));
    let got = nested_result.lock().unwrap().take().expect("callback should have fired by now");
    assert_eq!(got, Err(OsalError::IncorrectObjState));
}

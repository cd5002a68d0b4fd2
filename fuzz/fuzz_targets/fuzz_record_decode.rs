#![no_main]
use gimbal_traits::CalibrationRecord;
use libfuzzer_sys::fuzz_target;

// Stored bytes come from EEPROM-like storage and may be anything.
fuzz_target!(|data: &[u8]| {
    if let Ok(rec) = CalibrationRecord::from_bytes(data) {
        let again = CalibrationRecord::from_bytes(&rec.to_bytes()).expect("re-decode");
        assert_eq!(again.to_bytes(), rec.to_bytes());
    }
});

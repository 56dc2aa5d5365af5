use std::fs;

use annual_timer::*;
use async_trait::async_trait;

#[derive(Default)]
struct Wire {
    lines: Vec<String>,
}

#[async_trait]
impl Transport for Wire {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.lines.push(String::from_utf8_lossy(bytes).into_owned());
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn saved_schedule_syncs_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("countdown_data.csv");

    let mut store = ScheduleStore::new();
    let spring = store.add_range("03-01", "05-31").unwrap();
    store.add_task(spring, "19:00", 30).unwrap();
    store.add_task(spring, "06:30", 15).unwrap();
    let winter = store.add_range("12-01", "02-28").unwrap();
    store.add_task(winter, "23:50", 20).unwrap();
    save_schedule(&path, &store).unwrap();

    let mut loaded = load_schedule(&path).unwrap().expect("file was written");
    assert_eq!(loaded.selected(), None);
    assert!(loaded.violations().is_empty());

    loaded.select(spring).unwrap();
    let mut device = ClockDevice::new(Wire::default(), SyncSettings::default());
    assert_eq!(device.sync_selected(&loaded).await.unwrap(), 2);

    loaded.select(winter).unwrap();
    device.sync_selected(&loaded).await.unwrap();

    assert_eq!(
        device.transport().lines,
        [
            "sendcsv\n", "06:30 15\n", "19:00 30\n", "EOF\n",
            "sendcsv\n", "23:50 20\n", "EOF\n",
        ]
    );
}

#[test]
fn legacy_file_with_crlf_rows_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("countdown_data.csv");
    fs::write(
        &path,
        "RANGE~01-01~06-30\r\nID,T,D\r\n0,08:00,45\r\n1,12:00\r\n\r\nRANGE~07-01~12-31\r\nID,T,D\r\n\r\n",
    )
    .unwrap();

    let mut store = load_schedule(&path).unwrap().unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.range(0).unwrap().tasks().len(), 1);

    // Loaded ranges are validated like any other on the next mutation
    let err = store.add_range("06-15", "07-15").unwrap_err();
    assert!(err.is_validation());
    store.add_task(1, "08:00", 45).unwrap();

    save_schedule(&path, &store).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.ends_with("RANGE~07-01~12-31\r\nID,T,D\r\n0,08:00,45\r\n\r\n"));
}

//! 格式化辅助函数

/// 把秒数格式化为易读的时长
///
/// 小于60秒显示秒，小于1小时显示分钟，否则显示小时和分钟
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{} {}", seconds, plural(seconds, "second"))
    } else if seconds < 3600 {
        let minutes = seconds / 60;
        format!("{} {}", minutes, plural(minutes, "minute"))
    } else {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        format!(
            "{} {}, {} {}",
            hours,
            plural(hours, "hour"),
            minutes,
            plural(minutes, "minute")
        )
    }
}

fn plural(count: u64, unit: &str) -> String {
    if count == 1 {
        unit.to_string()
    } else {
        format!("{unit}s")
    }
}

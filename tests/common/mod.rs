//! Synthetic sensor tables shaped like the weight lifting dataset

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const LABELS: [&str; 5] = ["A", "B", "C", "D", "E"];

/// Predictors that survive the name and missingness filters
pub const DENSE_SENSORS: [&str; 5] = [
    "roll_belt",
    "pitch_belt",
    "total_accel_dumbbell",
    "gyros_forearm_x",
    "magnet_arm_z",
];

fn jitter(row: usize, k: usize) -> f64 {
    ((row * 37 + k * 11) % 17) as f64 / 20.0
}

fn sensor_values(class: usize, row: usize) -> [f64; 5] {
    let c = class as f64;
    [
        c * 3.0 + jitter(row, 0),
        -c * 2.0 + jitter(row, 1),
        c * c + jitter(row, 2),
        // weak, noisy
        ((row * 7919) % 101) as f64 / 10.0,
        10.0 + c + jitter(row, 4),
    ]
}

/// Training CSV with `n_per_class` rows of each label.
///
/// Besides the dense sensors it carries identifier columns that fail the name
/// pattern, a sparse summary column and an 85%-present column.
pub fn training_csv(n_per_class: usize) -> String {
    let mut out = String::from(
        "X,user_name,raw_timestamp_part_1,roll_belt,pitch_belt,total_accel_dumbbell,\
         gyros_forearm_x,magnet_arm_z,kurtosis_roll_belt,max_picth_arm,classe\n",
    );
    let n = n_per_class * LABELS.len();
    for row in 0..n {
        let class = row % LABELS.len();
        let v = sensor_values(class, row);

        let magnet = if row % 25 == 3 { "NA".to_string() } else { format!("{:.3}", v[4]) };
        let kurtosis = match row % 50 {
            0 => "1.25".to_string(),
            1 => "#DIV/0!".to_string(),
            _ => "NA".to_string(),
        };
        let max_pitch = if row % 20 < 3 { String::new() } else { format!("{}", row % 9) };

        writeln!(
            out,
            "{},user{},{},{:.3},{:.3},{:.3},{:.3},{},{},{},{}",
            row + 1,
            row % 6,
            1_322_000_000 + row,
            v[0],
            v[1],
            v[2],
            v[3],
            magnet,
            kurtosis,
            max_pitch,
            LABELS[class]
        )
        .unwrap();
    }
    out
}

/// Quiz CSV: 20 rows with known classes, outcome replaced by `problem_id`
pub fn quiz_csv(columns: &[&str]) -> (String, Vec<&'static str>) {
    let mut out = String::from("X,user_name");
    for c in columns {
        out.push(',');
        out.push_str(c);
    }
    out.push_str(",problem_id\n");

    let all = DENSE_SENSORS;
    let mut truth = Vec::with_capacity(20);
    for i in 0..20 {
        let class = (i * 3) % LABELS.len();
        let v = sensor_values(class, 1000 + i);
        write!(out, "{},user{}", i + 1, i % 6).unwrap();
        for c in columns {
            let idx = all.iter().position(|a| a == c).unwrap_or(0);
            write!(out, ",{:.3}", v[idx]).unwrap();
        }
        writeln!(out, ",{}", i + 1).unwrap();
        truth.push(LABELS[class]);
    }
    (out, truth)
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

use {
    logcascade::{RotatingFileBuilder, RotationSize},
    std::io::Write,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = RotatingFileBuilder::new("./logs/sized.log")
        .rotation_size(RotationSize::KB(4)) // Rotate once the file holds 4 KB
        .max_keep_files(5) // Keep sized.log.01 .. sized.log.05
        .file_mode(0o640) // Set file permissions to: owner rw, group r, others none
        .build()?;

    // Rotation only happens when the file is (re)opened, so re-open the sink
    // every hundred lines as a long-running service would on SIGHUP.
    for i in 1..=1000 {
        writeln!(
            &logger,
            "Log entry #{}: This is a sample log message that will contribute to file size",
            i
        )?;
        if i % 100 == 0 {
            let report = logger.reopen()?;
            println!("after entry {i}: {:?}", report.outcome);
        }
    }

    Ok(())
}

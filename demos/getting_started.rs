use geonear::{ColumnMapping, Config, GeoSearchEngine, Point, ProcessorBuilder, build_index};
use std::io::Write;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("GeoNear - Getting Started Example");
    println!("=================================");

    // Index a handful of coordinates directly
    let index = build_index(vec![
        (48.8566, 2.3522, 0),    // Paris
        (48.8049, 2.1204, 1),    // Versailles
        (49.4431, 1.0993, 2),    // Rouen
        (51.5074, -0.1278, 3),   // London
        (40.7128, -74.0060, 4),  // New York
    ]);
    let stats = index.stats();
    println!(
        "✓ Indexed {} points (height {}, {} nodes)",
        stats.points, stats.height, stats.nodes
    );

    let paris = Point::new(48.8566, 2.3522);
    let nearby = GeoSearchEngine::new().search(&index, &paris, 150.0);
    println!("✓ {} points within 150 km of Paris:", nearby.len());
    for point in &nearby {
        println!("    {} at {:.1} km", point, paris.distance(point));
    }

    // Index a CSV file and read the matching records back
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "name,latitude,longitude")?;
    writeln!(file, "\"Charles de Gaulle\",49.0097,2.5479")?;
    writeln!(file, "Orly,48.7262,2.3652")?;
    writeln!(file, "Beauvais,49.4544,2.1128")?;
    writeln!(file, "Heathrow,51.4700,-0.4543")?;
    file.flush()?;

    let config = Config::default()
        .with_columns(ColumnMapping::new(1, 2))
        .with_header(true)
        .with_max_results(3);

    let mut processor = ProcessorBuilder::new()
        .dataset(file.path())
        .config(config)
        .build()?;
    processor.preprocess()?;

    let records = processor.process(&paris, 100.0)?;
    println!("✓ {} airports within 100 km of Paris:", records.len());
    for record in &records {
        println!("    {}", record);
    }

    println!("\nDone.");
    Ok(())
}

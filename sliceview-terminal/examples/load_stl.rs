/// Example: Load an STL file and open it in the terminal viewer
///
/// Usage: cargo run --example load_stl -- path/to/file.stl
use std::env;
use std::io;
use std::path::PathBuf;

use sliceview_core::{stl, Geometry, Settings, Viewer};
use sliceview_terminal::TerminalApp;

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();

    let geometry = match args.get(1) {
        Some(path) => {
            println!("Loading STL file: {path}");
            stl::load_stl(path).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        }
        None => {
            eprintln!("Usage: {} <stl-file>", args[0]);
            eprintln!("\nNo STL file provided, using default cube...");
            Geometry::cube(2.0)
        }
    };
    println!("Loaded {} triangles", geometry.triangle_count());

    let to_io = |e| io::Error::new(io::ErrorKind::Other, e);
    let mut viewer = Viewer::new(Settings::default(), (1, 1)).map_err(to_io)?;
    viewer.add_geometry(&geometry).map_err(to_io)?;
    viewer.pack().map_err(to_io)?;

    let mut app = TerminalApp::new(viewer, PathBuf::from("."))?;
    app.run()
}

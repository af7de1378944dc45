use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Output directory (default: dist/share/man/man1)
    #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
    pub out_dir: PathBuf,
}

pub fn cmd_man(args: ManArgs) -> Result<(), String> {
    let out_dir = crate::workspace_root().join(&args.out_dir);
    fs::create_dir_all(&out_dir).map_err(|e| format!("{}: {e}", out_dir.display()))?;

    let cmd = shipgate::command();
    write_page(&out_dir, "shipgate.1", cmd.clone())?;

    // One page per subcommand, including nested ones (`contributors fetch`)
    for sub in cmd.get_subcommands() {
        let name = format!("shipgate-{}", sub.get_name());
        write_page(&out_dir, &format!("{name}.1"), sub.clone())?;
        for nested in sub.get_subcommands() {
            let nested_name = format!("{name}-{}", nested.get_name());
            write_page(&out_dir, &format!("{nested_name}.1"), nested.clone())?;
        }
    }

    Ok(())
}

fn write_page(out_dir: &Path, file_name: &str, cmd: clap::Command) -> Result<(), String> {
    let mut buffer: Vec<u8> = Vec::new();
    clap_mangen::Man::new(cmd)
        .render(&mut buffer)
        .map_err(|e| format!("render {file_name}: {e}"))?;

    let path = out_dir.join(file_name);
    fs::write(&path, buffer).map_err(|e| format!("{}: {e}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

//! ISY node definitions for the active channel maps.

use std::fmt::Write;
use std::path::Path;

use crate::error::Result;
use crate::units::{Category, ChannelMap};

const CONTROLLER: &str = r#"  <nodeDef id="MeteoBridge" nodeType="139" nls="ctl">
    <sts>
      <st id="ST" editor="bool" />
      <st id="GV0" editor="I_VOLTS" />
    </sts>
    <cmds>
      <sends />
      <accepts>
        <cmd id="DISCOVER" />
        <cmd id="REMOVE_NOTICES_ALL" />
        <cmd id="UPDATE_PROFILE" />
      </accepts>
    </cmds>
  </nodeDef>
"#;

fn nodedef(category: Category) -> (&'static str, &'static str) {
    match category {
        Category::Temperature => ("temperature", "139T"),
        Category::Humidity => ("humidity", "139H"),
        Category::Pressure => ("pressure", "139P"),
        Category::Wind => ("wind", "139W"),
        Category::Precipitation => ("precipitation", "139R"),
        Category::Light => ("light", "139L"),
        Category::Lightning => ("lightning", "139S"),
    }
}

/// Render `nodedefs.xml`. Categories without active channels are left out.
pub fn render_nodedefs(maps: &[ChannelMap]) -> String {
    let mut xml = String::from("<nodeDefs>\n");
    xml.push_str(CONTROLLER);

    for map in maps.iter().filter(|m| !m.is_empty()) {
        let (id, nls) = nodedef(map.category());
        // Writing to a String cannot fail.
        let _ = writeln!(xml, "  <nodeDef id=\"{id}\" nodeType=\"139\" nls=\"{nls}\">");
        xml.push_str("    <sts>\n");
        for entry in map.entries() {
            let _ = writeln!(
                xml,
                "      <st id=\"{}\" editor=\"{}\" />",
                entry.slot,
                entry.uom.editor()
            );
        }
        xml.push_str("    </sts>\n");
        xml.push_str("  </nodeDef>\n");
    }

    xml.push_str("</nodeDefs>\n");
    xml
}

/// Render and write `nodedefs.xml` to `path`, creating parent directories.
pub fn write_nodedefs(path: &Path, maps: &[ChannelMap]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_nodedefs(maps))?;
    log::info!("Wrote node definitions to {}", path.display());
    Ok(())
}

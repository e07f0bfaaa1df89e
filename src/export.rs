//! CSV export of the standings table.

use crate::models::Standing;
use std::io::{self, Write};

/// Write one header row and one row per standing, in the given order.
pub fn write_standings_csv<W: Write>(standings: &[Standing], writer: W) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    for row in standings {
        out.serialize(row)?;
    }
    out.flush()?;
    Ok(())
}

pub fn standings_csv(standings: &[Standing]) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    write_standings_csv(standings, &mut buf)?;
    String::from_utf8(buf).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err).into())
}

//! netsweep - WHOIS and Bing IP search over domains, addresses and ranges.

use anyhow::Result;

fn main() -> Result<()> {
    netsweep_cli::run()
}

// Copyright 2025 The smckit Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command-line tool over the smckit library: print temperature sensors,
//! fan speeds, and power state, probe keys, and set fan speed floors.

use clap::Parser;

use smckit::{Smc, SmcValue};

#[derive(Parser)]
#[command(name = "smckit", version, about = "Apple SMC command-line tool")]
struct Cli {
    /// Show temperature sensors whose hardware mapping is known
    #[arg(short = 't', long)]
    temperature: bool,

    /// Show SMC keys (FourCC) when printing temperature sensors
    #[arg(short = 'd', long)]
    display_keys: bool,

    /// Show fan speeds (RPM)
    #[arg(short = 'f', long)]
    fan: bool,

    /// Show power related information
    #[arg(short = 'p', long)]
    power: bool,

    /// Show misc information
    #[arg(short = 'm', long)]
    misc: bool,

    /// Check if a FourCC is a valid SMC key on this machine
    #[arg(short = 'k', long, value_name = "KEY")]
    check_key: Option<String>,

    /// Read a key and print its decoded value
    #[arg(short = 'r', long, value_name = "KEY")]
    read: Option<String>,

    /// The id (starting from 0) of the fan whose minimum speed to set
    #[arg(short = 'n', long, value_name = "ID", requires = "fan_speed")]
    fan_id: Option<u32>,

    /// The minimum speed (RPM) of the fan to set; requires root
    #[arg(short = 's', long, value_name = "RPM", requires = "fan_id")]
    fan_speed: Option<u32>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("smckit: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> smckit::Result<()> {
    let smc = Smc::open()?;

    if let Some(name) = &cli.check_key {
        let valid = smc.is_key_valid(name)?;
        println!("{name}: {}", if valid { "valid" } else { "not found" });
        return Ok(());
    }

    if let Some(name) = &cli.read {
        let key = smc.key_information(name)?;
        let value = smc.read_value(name)?;
        println!(
            "{name} ({}, {} bytes): {}",
            key.info.data_type,
            key.info.data_size,
            render_value(&value)
        );
        return Ok(());
    }

    if let (Some(fan), Some(rpm)) = (cli.fan_id, cli.fan_speed) {
        smc.set_fan_min_speed(fan, rpm)?;
        println!("fan {fan} minimum speed set to {rpm} RPM");
        return Ok(());
    }

    // With no selection, print everything, like the machine overview the
    // original tool gives.
    let all = !(cli.temperature || cli.fan || cli.power || cli.misc);

    if cli.temperature || all {
        print_temperatures(&smc, cli.display_keys)?;
    }
    if cli.fan || all {
        print_fans(&smc)?;
    }
    if cli.power || all {
        print_power(&smc)?;
    }
    if cli.misc || all {
        print_misc(&smc)?;
    }

    Ok(())
}

fn print_temperatures(smc: &Smc, display_keys: bool) -> smckit::Result<()> {
    println!("-- Temperature --");
    for sensor in smc.known_temperature_sensors()? {
        let celsius = smc.temperature(sensor.code)?;
        if display_keys {
            println!("{}  {:24} {celsius:6.1} °C", sensor.code, sensor.label);
        } else {
            println!("{:24} {celsius:6.1} °C", sensor.label);
        }
    }
    Ok(())
}

fn print_fans(smc: &Smc) -> smckit::Result<()> {
    println!("-- Fan --");
    let count = smc.fan_count()?;
    println!("Total fans in system: {count}");
    for fan in 0..count {
        let name = smc.fan_name(fan).unwrap_or_else(|_| format!("Fan {fan}"));
        println!("[id {fan}] {name}");
        println!("    Current: {:6.0} RPM", smc.fan_current_speed(fan)?);
        println!("    Min:     {:6.0} RPM", smc.fan_min_speed(fan)?);
        println!("    Max:     {:6.0} RPM", smc.fan_max_speed(fan)?);
    }
    Ok(())
}

fn print_power(smc: &Smc) -> smckit::Result<()> {
    println!("-- Power --");
    println!("AC present:       {}", smc.is_ac_present()?);
    println!("Battery powered:  {}", smc.is_on_battery_power()?);
    println!("Charging:         {}", smc.is_charging()?);
    println!("Battery ok:       {}", smc.is_battery_ok()?);
    println!("Battery count:    {}", smc.battery_count()?);
    Ok(())
}

fn print_misc(smc: &Smc) -> smckit::Result<()> {
    println!("-- Misc --");
    println!("Total SMC keys:   {}", smc.key_count()?);
    println!("Disk in ODD:      {}", smc.is_optical_disk_drive_full()?);
    Ok(())
}

fn render_value(value: &SmcValue) -> String {
    match value {
        SmcValue::Bytes { bytes, .. } => bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" "),
        SmcValue::Flag(flag) => flag.to_string(),
        other => match other.as_f64() {
            Some(n) => n.to_string(),
            None => format!("{other:?}"),
        },
    }
}

use std::io::{stdin, stdout, BufWriter};

use bytesize::ByteSize;
use clap::{Arg, ArgAction, Command};
use tracing::info;

use zpack::decompressor::Decompresser;
use zpack::CompressParams;

fn main() -> anyhow::Result<()> {
    let matches = Command::new("zpack")
        .arg(
            Arg::new("method")
                .short('m')
                .long("method")
                .default_value("1")
                .conflicts_with_all(["decompress", "list"]),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .default_value("1")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("decompress")
                .short('d')
                .long("decompress")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("size")
                .long("size")
                .help("print the compressed size instead of the compressed data")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list")
                .short('l')
                .long("list")
                .help("list the segments of a compressed stream")
                .action(ArgAction::SetTrue)
                .conflicts_with("decompress"),
        )
        .arg(Arg::new("verbose").short('v').long("verbose").action(ArgAction::SetTrue))
        .get_matches();

    if matches.get_flag("verbose") {
        tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    }

    let mut reader = stdin().lock();
    let mut writer = BufWriter::new(stdout().lock());

    if matches.get_flag("list") {
        return list(&mut reader);
    }

    if matches.get_flag("decompress") {
        if matches.get_flag("size") {
            println!("{}", zpack::decompress_size(&mut reader)?);
        } else {
            zpack::decompress(&mut reader, &mut writer)?;
        }
        return Ok(());
    }

    let method = matches.get_one::<String>("method").map_or("1", String::as_str);
    let params = CompressParams::new(method).checksum(true);
    info!(
        "method {}, blocks of {}",
        method,
        ByteSize(zpack::block_size_for(method) as u64)
    );
    if matches.get_flag("size") {
        let threads = matches.get_one::<usize>("threads").copied().unwrap_or(1);
        let size = zpack::compress_size_parallel(reader, &params, threads)?;
        println!("{} ({})", size, ByteSize(size));
    } else {
        zpack::compress(&mut reader, &mut writer, &params)?;
    }
    Ok(())
}

fn list(reader: &mut dyn std::io::Read) -> anyhow::Result<()> {
    let mut d = Decompresser::new();
    d.set_input(reader);
    let mut block = 0;
    while let Some(memory) = d.find_block()? {
        println!("block {} (needs {})", block, ByteSize(memory as u64));
        let mut name = Vec::new();
        while d.find_filename(Some(&mut name))? {
            let mut comment = Vec::new();
            d.read_comment(Some(&mut comment))?;
            d.decompress(-1)?;
            let trailer = d.read_segment_end()?;
            let digest = match trailer[0] {
                253 => hex::encode(&trailer[1..]),
                _ => "-".into(),
            };
            println!(
                "  {:?} {:?} sha1 {}",
                String::from_utf8_lossy(&name),
                String::from_utf8_lossy(&comment),
                digest
            );
            name.clear();
        }
        block += 1;
    }
    Ok(())
}

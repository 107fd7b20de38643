use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use log::info;
use mashifs::{FileDisk, Volume, ROOTINO};

fn cli() -> Command {
    let image = || Arg::new("image").required(true).help("disk image file");
    Command::new("mashifs")
        .about("Format and inspect MashiFS disk images")
        .subcommand_required(true)
        .subcommand(
            Command::new("format").about("create a fresh volume").arg(image()).arg(
                Arg::new("blocks")
                    .long("blocks")
                    .short('b')
                    .value_parser(value_parser!(u32))
                    .default_value("4096")
                    .help("volume size in blocks"),
            ),
        )
        .subcommand(Command::new("info").about("print the superblock").arg(image()))
        .subcommand(
            Command::new("mkdir")
                .about("create directories")
                .arg(image())
                .arg(Arg::new("names").required(true).num_args(1..))
                .arg(
                    Arg::new("parent")
                        .long("parent")
                        .short('p')
                        .value_parser(value_parser!(u16))
                        .help("inode number of the parent directory [default: root]"),
                ),
        )
        .subcommand(
            Command::new("ls").about("list a directory").arg(image()).arg(
                Arg::new("inode")
                    .value_parser(value_parser!(u16))
                    .help("directory inode number [default: root]"),
            ),
        )
        .subcommand(Command::new("check").about("check volume consistency").arg(image()))
}

/// An optional inode argument, the root directory when absent.
fn inode_arg(args: &ArgMatches, id: &str) -> u16 {
    args.get_one::<u16>(id).copied().unwrap_or(ROOTINO)
}

fn mount(args: &ArgMatches) -> Result<Volume> {
    let path = args.get_one::<String>("image").unwrap();
    let disk = FileDisk::open(path).with_context(|| format!("cannot open image {path}"))?;
    Volume::mount(Arc::new(disk)).with_context(|| format!("cannot mount {path}"))
}

fn run(matches: ArgMatches) -> Result<ExitCode> {
    match matches.subcommand() {
        Some(("format", args)) => {
            let path = args.get_one::<String>("image").unwrap();
            let blocks = *args.get_one::<u32>("blocks").unwrap();
            let disk = FileDisk::create(path, blocks as usize)
                .with_context(|| format!("cannot create image {path}"))?;
            let vol = Volume::init(Arc::new(disk), blocks).context("format failed")?;
            info!("formatted {path}");
            println!(
                "{path}: {} blocks, {} free, data starts at block {}",
                vol.size(),
                vol.super_blk().total_free_blocks,
                vol.super_blk().data_start()
            );
        }
        Some(("info", args)) => {
            let vol = mount(args)?;
            let sb = vol.super_blk();
            println!("magic          {:#010x}", sb.magic);
            println!("total blocks   {}", sb.total_blocks);
            println!("free blocks    {}", sb.total_free_blocks);
            println!("bitmap blocks  {}", sb.total_bitmap_blocks);
            println!("root inode     {}", sb.root);
            println!("inodes in use  {}", vol.allocated_inodes().len());
        }
        Some(("mkdir", args)) => {
            let mut vol = mount(args)?;
            let parent = inode_arg(args, "parent");
            for name in args.get_many::<String>("names").unwrap() {
                let inum = vol
                    .create_directory(parent, name)
                    .with_context(|| format!("mkdir {name}"))?;
                println!("{name}: inode {inum}");
            }
            vol.sync().context("cannot write superblock")?;
        }
        Some(("ls", args)) => {
            let vol = mount(args)?;
            let dir = inode_arg(args, "inode");
            let name = if dir == ROOTINO {
                "/".to_string()
            } else {
                vol.dir_name(dir)?
            };
            println!("{name} (inode {dir})");
            for entry in vol.read_dir(dir)? {
                println!("{:>5}  {}", entry.inumber, entry.name_lossy());
            }
        }
        Some(("check", args)) => {
            let vol = mount(args)?;
            let report = vol.check()?;
            println!(
                "{} inodes, {} blocks checked",
                report.inodes_checked, report.blocks_checked
            );
            for inum in &report.orphans {
                println!("orphan inode {inum}");
            }
            for bno in &report.leaked {
                println!("leaked block {bno}");
            }
            for err in &report.errors {
                println!("error: {err}");
            }
            if !report.is_clean() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Some((other, _)) => bail!("unknown command {other}"),
        None => unreachable!("subcommand_required"),
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    run(cli().get_matches())
}

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use h265_rtp::config::{DEFAULT_CYCLE_MS, DEFAULT_MTU, DEFAULT_PAYLOAD_TYPE, DEFAULT_SAMPLE_RATE};
use h265_rtp::media::annexb::{AnnexBWriter, split_nal_units};
use h265_rtp::transport::{InterleavedReader, InterleavedWriter, UdpSink, UdpTransport};
use h265_rtp::{
    BufferPool, CodecConfig, CycleLength, Depacketizer, H265Depacketizer, H265Frame,
    H265Packetizer, PacketSink, Packetizer,
};

#[derive(Parser)]
#[command(
    name = "h265-rtp",
    about = "Convert between H.265 Annex-B streams and interleaved RTP"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split an Annex-B file into RTP packets.
    Packetize(PacketizeArgs),
    /// Reassemble an interleaved RTP capture into an Annex-B file.
    Depacketize(DepacketizeArgs),
}

#[derive(Args)]
struct PacketizeArgs {
    /// Annex-B input file
    input: PathBuf,
    /// Write interleaved packets to this file
    #[arg(long, short, conflicts_with = "udp", required_unless_present = "udp")]
    output: Option<PathBuf>,
    /// Send plain RTP to this peer instead (host:port)
    #[arg(long)]
    udp: Option<SocketAddr>,
    /// Pictures per second; the timestamp advances once per access unit
    #[arg(long, default_value_t = 25)]
    fps: u32,
    /// Maximum payload bytes per packet
    #[arg(long, default_value_t = DEFAULT_MTU)]
    mtu: usize,
    /// RTP payload type
    #[arg(long, default_value_t = DEFAULT_PAYLOAD_TYPE)]
    pt: u8,
    /// Interleaved channel id
    #[arg(long, default_value_t = 0)]
    channel: u8,
    /// Fixed SSRC (random when omitted)
    #[arg(long)]
    ssrc: Option<u32>,
    /// Timestamp wraparound cycle in milliseconds
    #[arg(long, default_value_t = DEFAULT_CYCLE_MS)]
    cycle_ms: u32,
}

#[derive(Args)]
struct DepacketizeArgs {
    /// Interleaved RTP input file
    input: PathBuf,
    /// Annex-B output file
    output: PathBuf,
    /// Only reassemble packets from this interleaved channel
    #[arg(long, default_value_t = 0)]
    channel: u8,
    /// RTP clock rate of the stream
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    clock_rate: u32,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Packetize(args) => packetize(args),
        Command::Depacketize(args) => depacketize(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn packetize(args: PacketizeArgs) -> h265_rtp::Result<()> {
    let config = CodecConfig {
        mtu: args.mtu,
        payload_type: args.pt,
        interleaved: args.channel,
        cycle: CycleLength::new(args.cycle_ms)?,
        ..Default::default()
    };
    let pool = BufferPool::default();
    let mut packetizer = match args.ssrc {
        Some(ssrc) => H265Packetizer::new(config, ssrc, pool.clone())?,
        None => H265Packetizer::with_random_ssrc(config, pool.clone())?,
    };

    let mut data = Vec::new();
    BufReader::new(File::open(&args.input)?).read_to_end(&mut data)?;

    if let Some(peer) = args.udp {
        let mut sink = UdpSink::new(UdpTransport::bind_ephemeral()?, peer, pool.clone());
        let frames = feed_nal_units(&data, args.fps, &mut packetizer, &pool, &mut sink);
        println!(
            "{} NAL units -> {} packets to {} ({} failed)",
            frames,
            sink.sent(),
            peer,
            sink.failed()
        );
        return Ok(());
    }

    let Some(output) = args.output else {
        return Ok(());
    };
    let file = BufWriter::new(File::create(&output)?);
    let mut writer = InterleavedWriter::new(file, pool.clone());
    let frames = feed_nal_units(&data, args.fps, &mut packetizer, &pool, &mut writer);
    let packets = writer.packets();
    let key_packets = writer.key_packets();
    writer.finish()?;
    println!(
        "{} NAL units -> {} packets ({} key) in {}",
        frames,
        packets,
        key_packets,
        output.display()
    );
    Ok(())
}

/// Send every NAL unit of an Annex-B stream; returns how many were sent.
fn feed_nal_units(
    data: &[u8],
    fps: u32,
    packetizer: &mut H265Packetizer,
    pool: &BufferPool,
    sink: &mut dyn PacketSink,
) -> usize {
    let mut clock = AccessUnitClock::new(fps);
    let nal_units = split_nal_units(data);
    for nal in &nal_units {
        let frame = H265Frame::from_nal(pool.obtain(), nal, clock.stamp_for(nal));
        packetizer.input_frame(&frame, sink);
        pool.recycle(frame.into_buffer());
    }
    nal_units.len()
}

/// Millisecond stamps for a NAL unit stream, one step per access unit.
///
/// A new access unit begins at a slice whose `first_mb_in_slice` is zero,
/// or at an access unit delimiter, SEI or parameter set that follows a
/// slice. All slices of one picture and the parameter sets ahead of it
/// share a stamp.
struct AccessUnitClock {
    frame_ms: u32,
    stamp: u32,
    in_picture: bool,
}

impl AccessUnitClock {
    fn new(fps: u32) -> Self {
        Self {
            frame_ms: 1000 / fps.max(1),
            stamp: 0,
            in_picture: false,
        }
    }

    fn stamp_for(&mut self, nal: &[u8]) -> u32 {
        let nal_type = nal.first().map_or(0, |b| b & 0x1f);
        let is_slice = (1..=5).contains(&nal_type);
        let starts_unit = if is_slice {
            // ue(v) first_mb_in_slice == 0 is the single bit `1`
            nal.get(1).is_none_or(|b| b & 0x80 != 0)
        } else {
            matches!(nal_type, 6..=9 | 14..=18)
        };
        if starts_unit && self.in_picture {
            self.stamp = self.stamp.wrapping_add(self.frame_ms);
            self.in_picture = false;
        }
        if is_slice {
            self.in_picture = true;
        }
        self.stamp
    }
}

fn depacketize(args: DepacketizeArgs) -> h265_rtp::Result<()> {
    let pool = BufferPool::default();
    let ticks_per_ms = h265_rtp::config::clock_ticks_per_ms(args.clock_rate);
    let reader = InterleavedReader::new(
        BufReader::new(File::open(&args.input)?),
        pool.clone(),
        ticks_per_ms,
    );
    let mut writer = AnnexBWriter::new(BufWriter::new(File::create(&args.output)?), pool.clone());
    let mut depacketizer = H265Depacketizer::new(pool.clone());

    let mut key_frames = 0usize;
    for packet in reader {
        let packet = match packet {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable packet");
                continue;
            }
        };
        if packet.interleaved == args.channel
            && depacketizer.input_packet(&packet, &mut writer)
            && packet.mark
        {
            key_frames += 1;
        }
        pool.recycle(packet.into_buffer());
    }

    let stats = depacketizer.stats();
    writer.finish()?;
    println!(
        "{} frames ({} key) -> {}, {} dropped, {} packets rejected",
        stats.frames,
        key_frames,
        args.output.display(),
        stats.dropped_frames,
        stats.rejected_packets
    );
    Ok(())
}

use std::io::{BufRead, Read, Write};

use log::debug;

use synctls::address::NetLocation;
use synctls::config::{self, ClientConfig, TlsClientConfig};
use synctls::tls_factory::TrustedTlsFactory;
use synctls::{SyncTlsReader, SyncTlsWriter};

fn print_usage_and_exit(arg0: String) {
    eprintln!(
        "Usage: {arg0} [--config/-c FILE] [--socks5 HOST:PORT] [--sni NAME] [--insecure/-k] [HOST:PORT]"
    );
    std::process::exit(1);
}

/// Copy stdin to the TLS writer a line at a time, flushing after each line.
fn copy_stdin(mut writer: SyncTlsWriter) {
    let stdin = std::io::stdin();
    let mut line = String::new();
    let mut stdin = stdin.lock();
    loop {
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if let Err(e) = writer
                    .write_all(line.as_bytes())
                    .and_then(|()| writer.flush())
                {
                    eprintln!("Failed to write to server: {e}");
                    break;
                }
            }
            Err(e) => {
                eprintln!("Failed to read stdin: {e}");
                break;
            }
        }
    }
    debug!("stdin closed");
    writer.close();
}

fn copy_to_stdout(mut reader: SyncTlsReader) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    let mut buf = vec![0u8; 16384];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        stdout.write_all(&buf[..n])?;
        stdout.flush()?;
    }
}

fn main() {
    env_logger::builder()
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            let level_style = buf.default_level_style(record.level());
            let sanitized_args = format!("{}", record.args())
                .chars()
                .map(|c| {
                    if c.is_ascii_graphic() || c == ' ' {
                        c
                    } else {
                        '?'
                    }
                })
                .collect::<String>();

            writeln!(
                buf,
                "[{} {level_style}{}{level_style:#} {}] {}",
                timestamp,
                record.level(),
                record.target(),
                sanitized_args
            )
        })
        .init();

    let mut args: Vec<String> = std::env::args().collect();
    let arg0 = args.remove(0);
    let mut config_path: Option<String> = None;
    let mut socks5_proxy: Option<String> = None;
    let mut sni_hostname: Option<String> = None;
    let mut insecure = false;

    while !args.is_empty() && args[0].starts_with("-") {
        let flag = args.remove(0);
        if flag == "--insecure" || flag == "-k" {
            insecure = true;
            continue;
        }
        if args.is_empty() {
            eprintln!("Missing argument for {flag}.");
            print_usage_and_exit(arg0);
            return;
        }
        let value = args.remove(0);
        if flag == "--config" || flag == "-c" {
            config_path = Some(value);
        } else if flag == "--socks5" {
            socks5_proxy = Some(value);
        } else if flag == "--sni" {
            sni_hostname = Some(value);
        } else {
            eprintln!("Invalid argument: {flag}");
            print_usage_and_exit(arg0);
            return;
        }
    }

    let mut client_config = match config_path {
        Some(path) => match config::load_config(&path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config: {e}\n");
                print_usage_and_exit(arg0);
                return;
            }
        },
        None => {
            if args.is_empty() {
                eprintln!("No server specified.");
                print_usage_and_exit(arg0);
                return;
            }
            let server = match NetLocation::from_str(&args.remove(0), Some(443)) {
                Ok(l) => l,
                Err(e) => {
                    eprintln!("Invalid server location: {e}");
                    print_usage_and_exit(arg0);
                    return;
                }
            };
            ClientConfig {
                server,
                socks5_proxy: None,
                tls: TlsClientConfig::default(),
                bridge: Default::default(),
            }
        }
    };

    if !args.is_empty() {
        eprintln!("Unexpected arguments: {}", args.join(" "));
        print_usage_and_exit(arg0);
        return;
    }

    if let Some(proxy) = socks5_proxy {
        match NetLocation::from_str(&proxy, Some(1080)) {
            Ok(l) => client_config.socks5_proxy = Some(l),
            Err(e) => {
                eprintln!("Invalid SOCKS5 proxy location: {e}");
                print_usage_and_exit(arg0);
                return;
            }
        }
    }
    if sni_hostname.is_some() {
        client_config.tls.sni_hostname = sni_hostname;
    }
    if insecure {
        client_config.tls.verify = false;
    }

    debug!("{client_config:#?}");

    let factory = match TrustedTlsFactory::new(&client_config.tls) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Failed to create TLS client config: {e}");
            std::process::exit(1);
        }
    };

    let streams = match factory.connect(
        &client_config.server,
        client_config.socks5_proxy.as_ref(),
        &client_config.bridge,
    ) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to connect to {}: {e}", client_config.server);
            std::process::exit(1);
        }
    };

    let (reader, writer) = streams.split();
    std::thread::spawn(move || copy_stdin(writer));

    if let Err(e) = copy_to_stdout(reader) {
        eprintln!("Connection closed: {e}");
        std::process::exit(1);
    }
}

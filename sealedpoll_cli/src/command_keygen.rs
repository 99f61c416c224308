use sealedpoll::Identity;

pub fn command_keygen(_matches: &clap::ArgMatches) {
    let (secret, public) = sealedpoll::generate_keypair();
    let identity = Identity::from(&public);

    println!("secret-key: {}", hex::encode(secret.to_bytes()));
    println!("identity: {}", identity);
}
